// Text normalisation shared by ranking, grading and routing

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// English and Spanish function words ignored by lexical matching
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "has",
    "have", "how", "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was",
    "what", "which", "who", "will", "with", "there", "their", "any", "our", "we", "you",
    // Spanish
    "al", "como", "con", "cual", "cuales", "de", "del", "el", "en", "es", "esta", "este", "la",
    "las", "lo", "los", "para", "por", "que", "se", "si", "su", "sus", "un", "una", "unos", "y",
    "o", "hay", "son", "ser", "nos", "le", "les",
];

/// Terms that mark a question as asking for concrete data
const DATA_HEAVY_TERMS: &[&str] = &[
    "fecha", "cronograma", "plazo", "presupuesto", "monto", "garantia", "pago", "%", "usd", "ars",
    "cuanto", "cuando", "timeline", "schedule", "date", "deadline", "budget", "amount",
    "guarantee", "payment", "how much", "when", "cost", "price", "precio", "costo", "calendario",
    "hito", "tabla", "porcentaje", "percentage", "cantidad",
];

static FIGURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("figure pattern is valid"));

static STRUCTURED: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b",
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"(?:\$|usd|ars|eur|€)\s?\d",
        r"\d+(?:[.,]\d+)?\s?%",
        r"(?m)^.*\|.*\|.*$",
        r"(?m)^[^\t\n]+\t[^\t\n]+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("structured data pattern is valid"))
    .collect()
});

/// Lowercase and strip accents (NFKD, combining marks removed).
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Content tokens of `text`: folded, split on non-alphanumerics, stop words removed.
pub fn tokens(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| t.chars().count() >= 2 || t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Numeric figures in `text`, reduced to their digits (`1.500.000` and
/// `1,500,000` both become `1500000`). Single digits are ignored.
pub fn figures(text: &str) -> Vec<String> {
    FIGURE
        .find_iter(text)
        .map(|m| m.as_str().chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|digits| digits.len() >= 2)
        .collect()
}

/// True when `text` contains dates, amounts, percentages or table rows.
pub fn has_structured_data(text: &str) -> bool {
    let folded = fold(text);
    STRUCTURED.iter().any(|re| re.is_match(&folded))
}

/// True when the question asks for dates, amounts or other concrete data.
pub fn is_data_heavy(question: &str) -> bool {
    let folded = fold(question);
    let words: Vec<&str> = folded
        .split(|c: char| !c.is_alphanumeric() && c != '%')
        .filter(|w| !w.is_empty())
        .collect();
    DATA_HEAVY_TERMS.iter().any(|term| {
        if term.contains(' ') || *term == "%" {
            folded.contains(*term)
        } else {
            words.contains(term)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("Garantía de Cumplimiento"), "garantia de cumplimiento");
        assert_eq!(fold("CLÁUSULA Ñandú"), "clausula nandu");
    }

    #[test]
    fn tokens_drop_stop_words() {
        assert_eq!(
            tokens("¿Cuál es el plazo de entrega del proyecto?"),
            vec!["plazo", "entrega", "proyecto"]
        );
        assert_eq!(tokens("What is the budget for 2025?"), vec!["budget", "2025"]);
    }

    #[test]
    fn figures_ignore_separators() {
        assert_eq!(
            figures("Budget USD 1.500.000 or 1,500,000, 15% advance, item 3"),
            vec!["1500000", "1500000", "15"]
        );
    }

    #[rstest]
    #[case("Entrega el 15/03/2025", true)]
    #[case("Monto total: USD 250.000", true)]
    #[case("Anticipo del 20 %", true)]
    #[case("| Item | Precio |\n| A | 10 |", true)]
    #[case("El proveedor debe contar con experiencia", false)]
    fn detects_structured_data(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(has_structured_data(text), expected);
    }

    #[rstest]
    #[case("¿Cuándo vence la garantía?", true)]
    #[case("How much is the advance payment?", true)]
    #[case("What percentage is withheld, in %?", true)]
    #[case("Describe the architecture", false)]
    #[case("Whenever possible, describe the team", false)]
    fn detects_data_heavy_questions(#[case] question: &str, #[case] expected: bool) {
        assert_eq!(is_data_heavy(question), expected);
    }
}
