//! Index name and document id resolution.

use crate::{
    config::{NamingConfig, global_config},
    error::Result,
    model::Model,
};
use serde::Serialize;
use serde_json::Value;

/// Resolve the index a record is stored in, with the global prefix and suffix.
pub fn index_name<M: Model>(model: &M) -> String {
    index_name_with(model, &global_config())
}

/// Resolve the index a record is stored in, with an explicit configuration.
pub fn index_name_with<M: Model>(model: &M, config: &NamingConfig) -> String {
    apply_affixes(&model.index_name(), config)
}

/// Resolve the indices searched for a record type, with the global prefix
/// and suffix applied to each.
pub fn search_index_names<M: Model>(model: &M) -> Vec<String> {
    search_index_names_with(model, &global_config())
}

/// Resolve the indices searched for a record type with an explicit
/// configuration.
pub fn search_index_names_with<M: Model>(model: &M, config: &NamingConfig) -> Vec<String> {
    model
        .search_index_names()
        .iter()
        .map(|name| apply_affixes(name, config))
        .collect()
}

/// Resolve a record's document id.
///
/// `Ok(None)` means the record carries no id. Errors from a custom
/// [`Model::document_id`] are returned as-is.
pub fn document_id<M: Model>(model: &M) -> Result<Option<String>> {
    Ok(model.document_id()?.filter(|id| !id.is_empty()))
}

/// Write a store-assigned id back into a record.
///
/// Returns `Ok(false)` without touching the record when its type does not
/// declare [`Model::AUTOMATIC_ID`].
pub fn set_document_id<M: Model>(model: &mut M, id: &str) -> Result<bool> {
    if !M::AUTOMATIC_ID {
        return Ok(false);
    }
    model.set_document_id(id)?;
    Ok(true)
}

/// Default index name: the type name converted to snake case.
///
/// Module path and generic arguments are ignored, so `app::UserProfile` and
/// `Wrapper<app::Item>` become `user_profile` and `wrapper`.
pub fn default_index_name<M: ?Sized>() -> String {
    let full = std::any::type_name::<M>();
    let base = full.split('<').next().unwrap_or(full);
    let name = base.rsplit("::").next().unwrap_or(base);
    to_snake(name)
}

/// Lowercase ASCII capitals, inserting `_` before a capital unless the
/// previous capital sits right before it. Runs of capitals stay together:
/// `HTTPLog` becomes `httplog`.
fn to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut len = 0;
    let mut last_upper = 0;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if last_upper + 1 < len {
                out.push('_');
                len += 1;
            }
            out.push(ch.to_ascii_lowercase());
            last_upper = len;
        } else {
            out.push(ch);
        }
        len += 1;
    }
    out
}

/// Default document id: the `id` field, or the `ID` field when there is no
/// `id`.
///
/// Integers become their decimal form and strings are used as-is. A missing
/// field, `null`, or any other value yields `Ok(None)`. Fields are looked up
/// by their serialized name.
pub fn default_document_id<M: Serialize + ?Sized>(model: &M) -> Result<Option<String>> {
    let value = serde_json::to_value(model)?;
    let Value::Object(fields) = value else {
        return Ok(None);
    };

    let id = match fields.get("id").or_else(|| fields.get("ID")) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    Ok(id)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Marker {
    Open,
    Close,
}

/// Match a dynamic index delimiter, raw (`<`, `>`) or percent-escaped
/// (`%3C`, `%3E`), at the start of `s`. Returns the marker and its length.
fn marker_at(s: &str) -> Option<(Marker, usize)> {
    let bytes = s.as_bytes();
    match bytes.first()? {
        b'<' => Some((Marker::Open, 1)),
        b'>' => Some((Marker::Close, 1)),
        b'%' if bytes.len() >= 3 => {
            if bytes[..3].eq_ignore_ascii_case(b"%3C") {
                Some((Marker::Open, 3))
            } else if bytes[..3].eq_ignore_ascii_case(b"%3E") {
                Some((Marker::Close, 3))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn is_dynamic(name: &str) -> bool {
    name.char_indices()
        .any(|(i, _)| marker_at(&name[i..]).is_some_and(|(m, _)| m == Marker::Open))
}

/// Apply the configured prefix and suffix to an index name.
///
/// Dynamic index names (date math such as `<logs-{now/d}>`) receive the
/// affixes inside each pair of delimiters so the expression stays valid:
/// `<logs-{now/d}>` with `p_`/`_s` becomes `<p_logs-{now/d}_s>`. This holds
/// for comma-separated lists and for percent-escaped delimiters.
pub fn apply_affixes(name: &str, config: &NamingConfig) -> String {
    let prefix = config.index_name_prefix.as_str();
    let suffix = config.index_name_suffix.as_str();

    if !is_dynamic(name) {
        return format!("{prefix}{name}{suffix}");
    }

    let mut out = String::with_capacity(name.len() + 2 * (prefix.len() + suffix.len()));
    let mut rest = name;
    while let Some(ch) = rest.chars().next() {
        match marker_at(rest) {
            Some((Marker::Open, len)) => {
                out.push_str(&rest[..len]);
                out.push_str(prefix);
                rest = &rest[len..];
            }
            Some((Marker::Close, len)) => {
                out.push_str(suffix);
                out.push_str(&rest[..len]);
                rest = &rest[len..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct UserProfile {
        id: u64,
        name: String,
    }

    impl Model for UserProfile {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Signed {
        #[serde(rename = "ID")]
        id: i32,
    }

    impl Model for Signed {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Tagged {
        id: bool,
        name: String,
    }

    impl Model for Tagged {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Anonymous {
        name: String,
    }

    impl Model for Anonymous {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Organization {
        #[serde(skip)]
        id: Option<String>,
        name: String,
    }

    impl Model for Organization {
        const AUTOMATIC_ID: bool = true;

        fn document_id(&self) -> Result<Option<String>> {
            self.id
                .clone()
                .map(Some)
                .ok_or_else(|| Error::UnknownDocumentId("ID is unknown".into()))
        }

        fn set_document_id(&mut self, id: &str) -> Result<()> {
            self.id = Some(id.to_string());
            Ok(())
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct DailyLog;

    impl Model for DailyLog {
        fn index_name(&self) -> String {
            "<my-index-{now/d}>,<my-index-{now/d-1d}>".to_string()
        }

        fn search_index_names(&self) -> Vec<String> {
            vec!["logs-current".to_string(), "<logs-{now/d}>".to_string()]
        }
    }

    #[test]
    fn test_default_index_name() {
        assert_eq!(default_index_name::<UserProfile>(), "user_profile");
        assert_eq!(default_index_name::<Vec<UserProfile>>(), "vec");
        assert_eq!(default_index_name::<Anonymous>(), "anonymous");
        assert_eq!(
            index_name_with(&UserProfile::default(), &NamingConfig::default()),
            "user_profile"
        );
    }

    #[test]
    fn test_capital_runs_stay_together() {
        struct HTTPLog;
        struct ABTest;
        struct Log2Event;
        struct V2Item;

        assert_eq!(default_index_name::<HTTPLog>(), "httplog");
        assert_eq!(default_index_name::<ABTest>(), "abtest");
        assert_eq!(default_index_name::<Log2Event>(), "log2_event");
        assert_eq!(default_index_name::<V2Item>(), "v2_item");
        assert_eq!(to_snake("userProfileID"), "user_profile_id");
    }

    #[test]
    fn test_index_name_with_affixes() {
        let config = NamingConfig::new("prefix_", "_suffix");
        assert_eq!(
            index_name_with(&UserProfile::default(), &config),
            "prefix_user_profile_suffix"
        );
    }

    #[test]
    fn test_affixes_inside_date_math() {
        let config = NamingConfig::new("p_", "_s");
        assert_eq!(apply_affixes("<idx-{now/d}>", &config), "<p_idx-{now/d}_s>");
        assert_eq!(
            index_name_with(&DailyLog, &NamingConfig::new("prefix_", "_suffix")),
            "<prefix_my-index-{now/d}_suffix>,<prefix_my-index-{now/d-1d}_suffix>"
        );
    }

    #[test]
    fn test_affixes_inside_escaped_date_math() {
        let config = NamingConfig::new("prefix_", "_suffix");
        let escaped = "%3Cmy-index-%7Bnow%2Fd%7D%3E%2C%3Cmy-index-%7Bnow%2Fd-1d%7D%3E";
        assert_eq!(
            apply_affixes(escaped, &config),
            "%3Cprefix_my-index-%7Bnow%2Fd%7D_suffix%3E%2C%3Cprefix_my-index-%7Bnow%2Fd-1d%7D_suffix%3E"
        );
        assert_eq!(
            apply_affixes("%3clogs%3e", &config),
            "%3cprefix_logs_suffix%3e"
        );
    }

    #[test]
    fn test_plain_percent_is_not_a_marker() {
        let config = NamingConfig::new("a_", "_b");
        assert_eq!(apply_affixes("100%25", &config), "a_100%25_b");
    }

    #[test]
    fn test_search_index_names_fan_out() {
        let config = NamingConfig::new("p_", "_s");
        assert_eq!(
            search_index_names_with(&DailyLog, &config),
            vec!["p_logs-current_s".to_string(), "<p_logs-{now/d}_s>".to_string()]
        );
        assert_eq!(
            search_index_names_with(&UserProfile::default(), &config),
            vec!["p_user_profile_s".to_string()]
        );
    }

    #[test]
    fn test_default_document_id() {
        let user = UserProfile {
            id: 1,
            name: "Alice".into(),
        };
        assert_eq!(document_id(&user).unwrap().as_deref(), Some("1"));
        assert_eq!(document_id(&Signed { id: -4 }).unwrap().as_deref(), Some("-4"));
        assert_eq!(document_id(&Anonymous::default()).unwrap(), None);
        assert_eq!(document_id(&Tagged::default()).unwrap(), None);
        assert_eq!(document_id(&DailyLog).unwrap(), None);
    }

    #[test]
    fn test_string_and_optional_ids() {
        #[derive(Serialize)]
        struct Named<'a> {
            id: &'a str,
        }
        #[derive(Serialize)]
        struct Maybe {
            id: Option<u32>,
        }

        assert_eq!(
            default_document_id(&Named { id: "abc" }).unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(default_document_id(&Named { id: "" }).unwrap(), None);
        assert_eq!(
            default_document_id(&Maybe { id: Some(9) }).unwrap().as_deref(),
            Some("9")
        );
        assert_eq!(default_document_id(&Maybe { id: None }).unwrap(), None);
    }

    #[test]
    fn test_automatic_id() {
        let mut org = Organization {
            id: None,
            name: "Doodle".into(),
        };
        assert!(matches!(
            document_id(&org),
            Err(Error::UnknownDocumentId(_))
        ));

        assert!(set_document_id(&mut org, "111").unwrap());
        assert_eq!(document_id(&org).unwrap().as_deref(), Some("111"));
    }

    #[test]
    fn test_set_document_id_skips_plain_models() {
        let mut user = UserProfile::default();
        assert!(!set_document_id(&mut user, "42").unwrap());
        assert_eq!(user.id, 0);
    }
}
