//! Recognise stock rejections and work out which lines they refer to.
//!
//! Servers that report rejected variant ids are handled exactly. For the
//! rest, product names are pulled out of the message text:
//!
//! - every `«…»` quoted name, e.g. `«Rose Mist» remaining in stock: 0`
//! - otherwise the text between `Could not add items ` and `. Only`

const STOCK_CODES: &[&str] = &["INSUFFICIENT_STOCK", "OUT_OF_STOCK"];

const STOCK_MESSAGES: &[&str] = &["remaining in stock", "insufficient stock", "out of stock"];

const ADD_PREFIX: &str = "Could not add items ";
const ADD_SUFFIX: &str = ". Only";

/// Whether an error (by code, then message) is a stock rejection.
#[must_use]
pub fn is_stock_error(code: Option<&str>, message: &str) -> bool {
    if code.is_some_and(|c| STOCK_CODES.contains(&c)) {
        return true;
    }
    let message = message.to_lowercase();
    STOCK_MESSAGES.iter().any(|needle| message.contains(needle))
}

/// Product names mentioned in a stock rejection message.
#[must_use]
pub fn product_names(message: &str) -> Vec<String> {
    let quoted = quoted_names(message);
    if !quoted.is_empty() {
        return quoted;
    }

    message
        .split_once(ADD_PREFIX)
        .and_then(|(_, rest)| rest.split_once(ADD_SUFFIX))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| vec![name.to_string()])
        .unwrap_or_default()
}

fn quoted_names(message: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = message;
    while let Some((_, after_open)) = rest.split_once('«') {
        let Some((name, after_close)) = after_open.split_once('»') else {
            break;
        };
        let name = name.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
        rest = after_close;
    }
    names
}

/// Case-insensitive substring match of any name against a line title.
#[must_use]
pub fn title_matches(title: &str, names: &[String]) -> bool {
    let title = title.to_lowercase();
    names
        .iter()
        .any(|name| title.contains(&name.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_stock_errors() {
        assert!(is_stock_error(Some("INSUFFICIENT_STOCK"), "whatever"));
        assert!(is_stock_error(None, "«Rose Mist» remaining in stock: 0"));
        assert!(is_stock_error(None, "Product is Out Of Stock"));
        assert!(!is_stock_error(Some("INVALID"), "Variant not found"));
    }

    #[test]
    fn test_quoted_names() {
        assert_eq!(
            product_names("«Rose Mist» remaining in stock: 0"),
            vec!["Rose Mist".to_string()]
        );
        assert_eq!(
            product_names("«Rose Mist», «Sea Salt» remaining in stock: 0"),
            vec!["Rose Mist".to_string(), "Sea Salt".to_string()]
        );
    }

    #[test]
    fn test_could_not_add_phrase() {
        assert_eq!(
            product_names("Could not add items Rose Mist 50ml. Only 0 remaining in stock."),
            vec!["Rose Mist 50ml".to_string()]
        );
    }

    #[test]
    fn test_unparseable_message_yields_nothing() {
        assert!(product_names("insufficient stock").is_empty());
        assert!(product_names("«unterminated").is_empty());
    }

    #[test]
    fn test_title_matching_is_case_insensitive_substring() {
        let names = vec!["rose mist".to_string()];
        assert!(title_matches("Rose Mist Body Oil", &names));
        assert!(!title_matches("Sea Salt Scrub", &names));
        assert!(!title_matches("Anything", &[]));
    }
}
