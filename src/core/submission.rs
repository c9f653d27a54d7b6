use crate::domain::model::{FormPayload, Submission};
use indexmap::IndexMap;

pub const SUBMISSION_PREFIX: &str = "questionnaireSubmissions";

/// Splits `questionnaireSubmissions[<index>][<field>]` into its two parts.
fn parse_submission_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(SUBMISSION_PREFIX)?;
    let rest = rest.strip_prefix('[')?;
    let (index, rest) = rest.split_once(']')?;
    let rest = rest.strip_prefix('[')?;
    let (field, _) = rest.split_once(']')?;
    Some((index, field))
}

/// Groups submission fields by index, keeping the order in which each index
/// first appears in the form.
pub fn group_submissions(form: &FormPayload) -> Vec<Submission> {
    let mut submissions: IndexMap<&str, Submission> = IndexMap::new();

    for (key, value) in form.iter() {
        if !key.starts_with(SUBMISSION_PREFIX) {
            continue;
        }

        let Some((index, field)) = parse_submission_key(key) else {
            tracing::debug!(key, "Ignoring malformed submission key");
            continue;
        };

        submissions
            .entry(index)
            .or_insert_with(|| Submission::new(index))
            .fields
            .insert(field.to_string(), value.to_string());
    }

    submissions.into_values().collect()
}
