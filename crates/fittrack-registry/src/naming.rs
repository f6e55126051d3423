//! Resource naming derived from the tenant name

/// `prefix` + lower-cased name with everything outside `[a-z0-9]` removed.
///
/// `None` when nothing of the name survives.
pub fn resource_name(prefix: &str, name: &str) -> Option<String> {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if slug.is_empty() {
        None
    } else {
        Some(format!("{}{}", prefix, slug))
    }
}

/// Public URL of a tenant's compute unit
pub fn public_url(resource_name: &str, domain: &str) -> String {
    format!("https://{}.{}", resource_name, domain)
}

/// Title of a tenant's durable namespace
pub fn namespace_title(resource_name: &str) -> String {
    format!("{}-kv", resource_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_examples() {
        assert_eq!(resource_name("fittrack", "Jane Doe").as_deref(), Some("fittrackjanedoe"));
        assert_eq!(resource_name("fittrack-", "O'Brien #2").as_deref(), Some("fittrack-obrien2"));
        assert_eq!(resource_name("fittrack", "José"), Some("fittrackjos".into()));
        assert_eq!(resource_name("fittrack", "!!!"), None);
        assert_eq!(public_url("fittrackjanedoe", "workers.dev"), "https://fittrackjanedoe.workers.dev");
        assert_eq!(namespace_title("fittrackjanedoe"), "fittrackjanedoe-kv");
    }

    proptest! {
        #[test]
        fn resource_name_is_deterministic_and_clean(name in ".{0,40}") {
            let a = resource_name("fittrack", &name);
            let b = resource_name("fittrack", &name);
            prop_assert_eq!(&a, &b);

            if let Some(n) = a {
                let slug = n.strip_prefix("fittrack").unwrap();
                prop_assert!(!slug.is_empty());
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            }
        }

        #[test]
        fn case_and_punctuation_do_not_matter(name in "[a-zA-Z0-9]{1,20}") {
            let decorated = format!(" {}!", name.to_uppercase());
            prop_assert_eq!(resource_name("fittrack", &name), resource_name("fittrack", &decorated));
        }
    }
}
