use super::types::PhoneNumber;

const DEEP_LINK_BASE: &str = "https://wa.me/";

/// Build the messaging deep link for a number, with the pre-filled message
/// appended as `?text=` when non-empty.
pub fn deep_link(phone: &PhoneNumber, message: &str) -> String {
    let mut link = format!("{DEEP_LINK_BASE}{}", phone.digits());
    if !message.is_empty() {
        link.push_str("?text=");
        link.push_str(&urlencoding::encode(message));
    }
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_without_message() {
        let phone = PhoneNumber::parse("+1 555-0100").unwrap();
        assert_eq!(deep_link(&phone, ""), "https://wa.me/15550100");
    }

    #[test]
    fn link_with_encoded_message() {
        let phone = PhoneNumber::parse("15550100").unwrap();
        assert_eq!(
            deep_link(&phone, "Hi there & welcome?"),
            "https://wa.me/15550100?text=Hi%20there%20%26%20welcome%3F"
        );
    }
}
