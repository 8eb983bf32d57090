//! Property tests over preferences and registration state.

use proptest::prelude::*;
use pushreg_core::{
    ClientState, CyclePlan, PreferenceKind, PreferenceStore, PreferenceValue, RegistrationState,
    RequestContext, SkipReason, SyncStatus,
};

fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_]{1,25}").unwrap()
}

fn label_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~]{1,64}").unwrap()
}

fn kind_strategy() -> impl Strategy<Value = PreferenceKind> {
    prop_oneof![
        Just(PreferenceKind::String),
        Just(PreferenceKind::Numeric),
        Just(PreferenceKind::Boolean),
    ]
}

fn category_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,15}").unwrap()
}

fn wrong_value(kind: PreferenceKind) -> PreferenceValue {
    match kind {
        PreferenceKind::Boolean => PreferenceValue::Number(1.0),
        PreferenceKind::Numeric => PreferenceValue::String("one".into()),
        PreferenceKind::String => PreferenceValue::Bool(true),
    }
}

proptest! {
    #[test]
    fn declared_preference_has_no_value(
        key in key_strategy(),
        label in label_strategy(),
        kind in kind_strategy()
    ) {
        let mut store = PreferenceStore::new();
        store.declare(&key, &label, kind).unwrap();

        let pref = store.get(&key).unwrap();
        prop_assert_eq!(&pref.label, &label);
        prop_assert_eq!(pref.kind, kind);
        prop_assert!(pref.value.is_none());
    }

    #[test]
    fn wrong_type_never_changes_value(key in key_strategy(), kind in kind_strategy()) {
        let mut store = PreferenceStore::new();
        store.declare(&key, "Label", kind).unwrap();
        let before = store.get(&key).cloned();

        prop_assert!(store.set_value(&key, wrong_value(kind)).is_err());
        prop_assert_eq!(store.get(&key).cloned(), before);
    }

    #[test]
    fn empty_replace_matches_unregister_all(
        cats in proptest::collection::vec(category_strategy(), 0..8)
    ) {
        let mut replaced = RegistrationState::new();
        replaced.set_device_token(vec![1, 2]).unwrap();
        replaced.add_categories(&cats).unwrap();
        let mut cleared = replaced.clone();

        replaced.replace_categories(Vec::<String>::new()).unwrap();
        cleared.unregister_all();
        prop_assert_eq!(replaced, cleared);
    }

    #[test]
    fn fingerprint_ignores_category_order(
        cats in proptest::collection::vec(category_strategy(), 1..8)
    ) {
        let mut forward = RegistrationState::new();
        forward.add_categories(&cats).unwrap();
        let mut backward = RegistrationState::new();
        for cat in cats.iter().rev() {
            backward.add_categories([cat]).unwrap();
        }
        prop_assert_eq!(forward.fingerprint().unwrap(), backward.fingerprint().unwrap());
    }

    #[test]
    fn synced_state_matches_its_fingerprint(
        cats in proptest::collection::vec(category_strategy(), 0..6),
        late in proptest::option::of(category_strategy())
    ) {
        let state = ClientState::in_memory();
        let ctx = RequestContext {
            api_key: "k".into(),
            time_zone: None,
            sdk_version: "t".into(),
        };
        state.mutate_registration(|r| r.set_device_token(vec![9])).unwrap();
        state.mutate_registration(|r| r.add_categories(&cats)).unwrap();

        let CyclePlan::Send(ticket) = state.begin_cycle(&ctx).unwrap() else {
            panic!("expected a send");
        };
        if let Some(cat) = &late {
            state.mutate_registration(|r| r.add_categories([cat])).unwrap();
        }
        state.complete_success(&ticket).unwrap();

        let registration = state.registration();
        prop_assert!(registration.is_consistent().unwrap());
        if registration.status() == SyncStatus::Synced {
            prop_assert_eq!(
                state.begin_cycle(&ctx).unwrap(),
                CyclePlan::Skip(SkipReason::UpToDate)
            );
        }
    }
}
