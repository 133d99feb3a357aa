use super::types::Keyword;
use crate::constants::DEFAULT_CATEGORY;

/// Tag `text` with the category of the first keyword it contains.
///
/// Keywords are tried in the order given, so the caller's ordering decides
/// which category wins when several match. Empty keyword words never match.
#[must_use]
pub fn detect_category(text: &str, keywords: &[Keyword]) -> String {
    let text = text.to_lowercase();

    keywords
        .iter()
        .filter(|kw| !kw.word.trim().is_empty())
        .find(|kw| text.contains(&kw.word.to_lowercase()))
        .map_or_else(|| DEFAULT_CATEGORY.to_string(), |kw| kw.category.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let keywords = vec![
            Keyword::new("exploit", "Security"),
            Keyword::new("market", "Commerce"),
        ];
        assert_eq!(detect_category("new exploit market", &keywords), "Security");

        let reversed = vec![
            Keyword::new("market", "Commerce"),
            Keyword::new("exploit", "Security"),
        ];
        assert_eq!(detect_category("new exploit market", &reversed), "Commerce");
    }

    #[test]
    fn test_case_insensitive() {
        let keywords = vec![Keyword::new("Carding", "Fraud")];
        assert_eq!(detect_category("Fresh CARDING dumps", &keywords), "Fraud");
    }

    #[test]
    fn test_default_category() {
        let keywords = vec![Keyword::new("exploit", "Security")];
        assert_eq!(detect_category("weather talk", &keywords), "Genel");
        assert_eq!(detect_category("anything", &[]), "Genel");
    }

    #[test]
    fn test_empty_word_is_ignored() {
        let keywords = vec![Keyword::new("", "Everything"), Keyword::new("leak", "Data")];
        assert_eq!(detect_category("db leak", &keywords), "Data");
    }
}
