use blockpad_core::config::load_config_from;
use blockpad_core::keymap::{
    Action, Chord, Key, KeymapIssue, Mode, ModeRouter, Modifiers, RouteOutcome,
};
use std::fs;

fn router_for(json: &str) -> (ModeRouter, Vec<KeymapIssue>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, json).unwrap();
    let load = load_config_from(&path);
    assert!(load.error.is_none(), "{:?}", load.error);
    let (keymap, issues) = load.config.resolve_keymap();
    (
        ModeRouter::new(keymap, load.config.pending_timeout()),
        issues,
    )
}

fn feed(router: &mut ModeRouter, keys: &str) -> Vec<RouteOutcome> {
    keys.chars()
        .map(|ch| router.handle_chord(Chord::plain(ch)))
        .collect()
}

#[test]
fn overridden_leader_sequence_fires_from_config_file() {
    let (mut router, issues) =
        router_for(r#"{"keymap": {"modes": {"document": {"insert_text": "<leader>n"}}}}"#);
    assert!(issues.is_empty(), "{issues:?}");

    assert_eq!(
        feed(&mut router, ",n"),
        [RouteOutcome::Pending, RouteOutcome::Fired(Action::InsertText)]
    );
    assert_eq!(
        feed(&mut router, ",z"),
        [RouteOutcome::Pending, RouteOutcome::Dropped]
    );
    assert_eq!(feed(&mut router, "j"), [RouteOutcome::Fired(Action::MoveDown)]);
    // The old default is gone.
    assert_eq!(
        feed(&mut router, ",bn"),
        [
            RouteOutcome::Pending,
            RouteOutcome::Pending,
            RouteOutcome::Dropped
        ]
    );
}

#[test]
fn shifted_letter_binding_fires_from_host_event() {
    let (mut router, issues) =
        router_for(r#"{"keymap": {"modes": {"document": {"insert_text": "<S-n>"}}}}"#);
    assert!(issues.is_empty(), "{issues:?}");
    let chord = Chord::from_host(Key::Char('N'), Modifiers::SHIFT).unwrap();
    assert_eq!(
        router.handle_chord(chord),
        RouteOutcome::Fired(Action::InsertText)
    );
}

#[test]
fn modifier_on_named_key_is_reported_and_reverted() {
    let (mut router, issues) =
        router_for(r#"{"keymap": {"modes": {"document": {"move_down": "<A-Up>"}}}}"#);
    assert!(matches!(
        issues.as_slice(),
        [KeymapIssue::InvalidBinding { mode: Mode::Document, .. }]
    ));
    assert_eq!(feed(&mut router, "j"), [RouteOutcome::Fired(Action::MoveDown)]);
}

#[test]
fn custom_leader_moves_every_leader_binding() {
    let (mut router, issues) = router_for(r#"{"keymap": {"leader": " "}}"#);
    assert!(issues.is_empty(), "{issues:?}");
    assert_eq!(
        feed(&mut router, " v"),
        [RouteOutcome::Pending, RouteOutcome::Fired(Action::OpenVault)]
    );
    assert_eq!(router.mode(), Mode::Document);
    assert_eq!(feed(&mut router, ","), [RouteOutcome::Dropped]);
}

#[test]
fn invalid_leader_is_reported_and_default_kept() {
    let (mut router, issues) = router_for(r#"{"keymap": {"leader": "ab"}}"#);
    assert_eq!(
        issues,
        [KeymapIssue::InvalidLeader {
            value: "\"ab\"".to_string()
        }]
    );
    assert_eq!(router.keymap().leader(), ',');
    assert_eq!(
        feed(&mut router, ",i"),
        [RouteOutcome::Pending, RouteOutcome::Fired(Action::OpenOutline)]
    );
}

#[test]
fn colliding_override_is_rejected_per_action() {
    let (mut router, issues) =
        router_for(r#"{"keymap": {"modes": {"vault": {"copy": "d"}}}}"#);
    assert!(matches!(
        issues.as_slice(),
        [KeymapIssue::Collision {
            mode: Mode::Vault,
            ..
        }]
    ));
    router.set_mode(Mode::Vault);
    assert_eq!(
        feed(&mut router, "yy"),
        [RouteOutcome::Pending, RouteOutcome::Fired(Action::Copy)]
    );
    assert_eq!(
        feed(&mut router, "dd"),
        [RouteOutcome::Pending, RouteOutcome::Fired(Action::Cut)]
    );
}
