use crate::config::GMAIL_DOMAIN;

/// Canonical comparison key for an address.
///
/// Trims and lowercases. For Gmail addresses the local part also loses its dots and
/// anything from the first `+` on, unless the `+` leads the local part. Anything without
/// exactly one `@` gets trim+lowercase only.
pub fn normalize(address: &str) -> String {
    let email = address.trim().to_lowercase();

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return email;
    };
    if domain != GMAIL_DOMAIN {
        return email;
    }

    let mut username = local.replace('.', "");
    if let Some(plus) = username.find('+') {
        if plus > 0 {
            username.truncate(plus);
        }
    }

    let mut key = String::with_capacity(username.len() + 1 + GMAIL_DOMAIN.len());
    key.push_str(&username);
    key.push('@');
    key.push_str(GMAIL_DOMAIN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_lowercases() {
        assert_eq!(normalize("  John.Doe@Example.COM \t"), "john.doe@example.com");
    }

    #[test]
    fn gmail_dots_and_tags() {
        assert_eq!(
            normalize(" First.Last+promo@gmail.com "),
            "firstlast@gmail.com"
        );
        assert_eq!(normalize("a.b.c@GMAIL.com"), "abc@gmail.com");
    }

    #[test]
    fn gmail_leading_plus_is_kept() {
        assert_eq!(normalize("+tag@gmail.com"), "+tag@gmail.com");
        // dots are stripped before the plus position is checked
        assert_eq!(normalize(".+tag@gmail.com"), "+tag@gmail.com");
    }

    #[test]
    fn other_domains_keep_dots_and_tags() {
        assert_eq!(normalize("first.last+x@yahoo.com"), "first.last+x@yahoo.com");
        assert_eq!(normalize("a@googlemail.com"), "a@googlemail.com");
    }

    #[test]
    fn malformed_addresses_only_trim_and_lowercase() {
        assert_eq!(normalize(" No-At-Sign "), "no-at-sign");
        assert_eq!(normalize("A.B@c@gmail.com"), "a.b@c@gmail.com");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            " First.Last+promo@gmail.com ",
            "+x.y@gmail.com",
            "..+@gmail.com",
            "A@B",
            "a@b@c",
            "   ",
            "MiXeD.Case@Domain.Org",
            "plus+first+second@gmail.com",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }
}
