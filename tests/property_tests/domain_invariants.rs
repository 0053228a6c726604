//! Validation rules on identifiers, content and paging

use allmitools::domain::{PageLimit, TextContent, TextId};
use proptest::prelude::*;

proptest! {
    #[test]
    fn generated_ids_survive_a_string_round_trip(_seed in any::<u64>()) {
        let id = TextId::generate();
        prop_assert_eq!(TextId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn any_uuid_text_parses(bytes in any::<[u8; 16]>()) {
        let uuid = uuid::Uuid::from_bytes(bytes);
        let parsed = TextId::parse(&uuid.to_string()).unwrap();
        prop_assert_eq!(*parsed.as_ref(), uuid);
    }

    #[test]
    fn non_uuid_text_is_a_validation_error(id in "[g-z]{1,40}") {
        prop_assert!(TextId::parse(&id).unwrap_err().is_validation());
    }

    #[test]
    fn non_empty_content_is_preserved(content in ".{1,200}") {
        let parsed = TextContent::parse(content.clone()).unwrap();
        prop_assert_eq!(parsed.into_inner(), content);
    }

    #[test]
    fn positive_page_limits_are_accepted(limit in 1u32..) {
        prop_assert_eq!(*PageLimit::parse(limit).unwrap().as_ref(), limit);
    }
}

#[test]
fn empty_content_and_zero_limit_are_rejected() {
    assert!(TextContent::parse("").unwrap_err().is_validation());
    assert!(PageLimit::parse(0).unwrap_err().is_validation());
}
