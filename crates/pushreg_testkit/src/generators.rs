//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that passes client-side validation.

use proptest::prelude::*;
use pushreg_core::{PreferenceKind, PreferenceValue, RegistrationState};

/// Strategy for generating valid preference keys.
pub fn preference_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_]{1,25}").expect("Invalid regex")
}

/// Strategy for generating valid preference labels.
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][ -~]{0,63}").expect("Invalid regex")
}

/// Strategy for generating preference types.
pub fn preference_kind_strategy() -> impl Strategy<Value = PreferenceKind> {
    prop_oneof![
        Just(PreferenceKind::String),
        Just(PreferenceKind::Numeric),
        Just(PreferenceKind::Boolean),
    ]
}

/// Strategy for generating a valid value of `kind`.
pub fn preference_value_strategy(kind: PreferenceKind) -> BoxedStrategy<PreferenceValue> {
    match kind {
        PreferenceKind::String => prop::string::string_regex("[ -~]{0,255}")
            .expect("Invalid regex")
            .prop_map(PreferenceValue::String)
            .boxed(),
        PreferenceKind::Numeric => (-1.0e9..1.0e9f64).prop_map(PreferenceValue::Number).boxed(),
        PreferenceKind::Boolean => any::<bool>().prop_map(PreferenceValue::Bool).boxed(),
    }
}

/// Returns a value whose type never matches `kind`.
pub fn mismatched_value(kind: PreferenceKind) -> PreferenceValue {
    match kind {
        PreferenceKind::Boolean => PreferenceValue::Number(1.0),
        PreferenceKind::Numeric => PreferenceValue::String("one".into()),
        PreferenceKind::String => PreferenceValue::Bool(true),
    }
}

/// Strategy for generating valid category names.
pub fn category_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating category lists, duplicates included.
pub fn category_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(category_strategy(), 0..12)
}

/// Strategy for generating push tokens.
pub fn device_token_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 8..64)
}

/// Strategy for generating user IDs.
pub fn user_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9._@-]{1,32}")
        .expect("Invalid regex")
        .prop_filter("User ID must not be blank", |s| !s.trim().is_empty())
}

/// A local registration mutation.
#[derive(Debug, Clone)]
pub enum RegistrationMutation {
    /// Set the push token.
    SetToken(Vec<u8>),
    /// Set the user ID.
    SetUserId(String),
    /// Clear the user ID.
    ClearUserId,
    /// Add categories.
    AddCategories(Vec<String>),
    /// Remove categories.
    RemoveCategories(Vec<String>),
    /// Replace the category set.
    ReplaceCategories(Vec<String>),
    /// Remove every category.
    ClearCategories,
}

impl RegistrationMutation {
    /// Applies the mutation. Returns true if the state changed.
    pub fn apply(&self, state: &mut RegistrationState) -> bool {
        let result = match self {
            Self::SetToken(token) => state.set_device_token(token.clone()),
            Self::SetUserId(user) => state.set_user_id(user),
            Self::ClearUserId => Ok(state.unregister_user_id()),
            Self::AddCategories(c) => state.add_categories(c),
            Self::RemoveCategories(c) => Ok(state.remove_categories(c)),
            Self::ReplaceCategories(c) => state.replace_categories(c),
            Self::ClearCategories => Ok(state.unregister_all()),
        };
        result.expect("Generated mutation should be valid")
    }
}

/// Strategy for generating registration mutations.
pub fn mutation_strategy() -> impl Strategy<Value = RegistrationMutation> {
    prop_oneof![
        device_token_strategy().prop_map(RegistrationMutation::SetToken),
        user_id_strategy().prop_map(RegistrationMutation::SetUserId),
        Just(RegistrationMutation::ClearUserId),
        category_list_strategy().prop_map(RegistrationMutation::AddCategories),
        category_list_strategy().prop_map(RegistrationMutation::RemoveCategories),
        category_list_strategy().prop_map(RegistrationMutation::ReplaceCategories),
        Just(RegistrationMutation::ClearCategories),
    ]
}

/// Strategy for generating mutation sequences.
pub fn mutation_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<RegistrationMutation>> {
    prop::collection::vec(mutation_strategy(), 1..=max_len)
}
