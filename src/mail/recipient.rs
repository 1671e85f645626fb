use crate::models::{OneOrMany, Recipient};

/// `"Name" <address>` when a display name is set, otherwise the bare address
pub fn format(recipient: &Recipient) -> String {
    match recipient.name.as_deref() {
        Some(name) => format!("\"{}\" <{}>", name.replace('"', "'"), recipient.address),
        None => recipient.address.clone(),
    }
}

/// Format a single recipient or a list, keeping the input's shape
pub fn format_many(recipients: &OneOrMany<Recipient>) -> OneOrMany<String> {
    recipients.map(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_and_without_name() {
        assert_eq!(format(&Recipient::new("a@x.com")), "a@x.com");
        assert_eq!(
            format(&Recipient::named("a@x.com", "Ann Lee")),
            "\"Ann Lee\" <a@x.com>"
        );
    }

    #[test]
    fn test_quotes_in_name_do_not_break_header() {
        assert_eq!(
            format(&Recipient::named("a@x.com", "Ann \"AL\" Lee")),
            "\"Ann 'AL' Lee\" <a@x.com>"
        );
    }

    #[test]
    fn test_format_many_preserves_shape() {
        let single = format_many(&OneOrMany::One(Recipient::new("a@x.com")));
        assert_eq!(single, OneOrMany::One("a@x.com".to_string()));

        let many = format_many(&OneOrMany::Many(vec![
            Recipient::new("a@x.com"),
            Recipient::named("b@x.com", "Bea"),
        ]));
        assert_eq!(
            many,
            OneOrMany::Many(vec![
                "a@x.com".to_string(),
                "\"Bea\" <b@x.com>".to_string()
            ])
        );
    }
}
