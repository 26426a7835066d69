// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use yare::parameterized;

fn limiter() -> (MailLimiter, TempDir) {
    let tmp = TempDir::new().unwrap();
    (MailLimiter::new(tmp.path()), tmp)
}

#[test]
fn mayor_is_never_limited() {
    let (limiter, _tmp) = limiter();
    for _ in 0..50 {
        assert!(limiter.allow_send(Role::Mayor, "mayor-session").unwrap());
    }
}

#[parameterized(
    dog = { Role::Dog },
    boot = { Role::Boot },
    unknown = { Role::Unknown },
)]
fn hard_blocked_roles_always_deny(role: Role) {
    let (limiter, _tmp) = limiter();
    assert!(!limiter.allow_send(role, "s1").unwrap());
    assert_eq!(limiter.count("s1"), 0, "blocked sends are not counted");
}

// Caps per role: deacon rejected on send 4, polecat/crew on send 2,
// witness/refinery on send 6.
#[parameterized(
    deacon = { Role::Deacon, 3 },
    polecat = { Role::Polecat, 1 },
    crew = { Role::Crew, 1 },
    witness = { Role::Witness, 5 },
    refinery = { Role::Refinery, 5 },
)]
fn bounded_roles_enforce_cap(role: Role, cap: u32) {
    let (limiter, _tmp) = limiter();
    for i in 0..cap {
        assert!(
            limiter.allow_send(role, "sess").unwrap(),
            "send {} should pass",
            i + 1
        );
    }
    assert!(
        !limiter.allow_send(role, "sess").unwrap(),
        "send {} should be rejected",
        cap + 1
    );
    assert_eq!(limiter.count("sess"), cap);
}

#[test]
fn sessions_do_not_share_counters() {
    let (limiter, _tmp) = limiter();
    assert!(limiter.allow_send(Role::Polecat, "gastown/nux").unwrap());
    assert!(limiter.allow_send(Role::Polecat, "gastown/slit").unwrap());
    assert!(!limiter.allow_send(Role::Polecat, "gastown/nux").unwrap());
}

#[test]
fn reset_clears_a_session() {
    let (limiter, _tmp) = limiter();
    assert!(limiter.allow_send(Role::Polecat, "sess").unwrap());
    assert!(!limiter.allow_send(Role::Polecat, "sess").unwrap());
    limiter.reset("sess");
    assert!(limiter.allow_send(Role::Polecat, "sess").unwrap());
}

#[test]
fn session_ids_are_sanitized_to_flat_filenames() {
    let (limiter, tmp) = limiter();
    limiter.allow_send(Role::Deacon, "gastown/deacon").unwrap();
    let dir = tmp.path().join("gt-mail-ratelimit");
    let names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["gastown_deacon.json".to_string()]);
}

#[cfg(unix)]
#[test]
fn counter_files_are_private() {
    use std::os::unix::fs::PermissionsExt;
    let (limiter, tmp) = limiter();
    limiter.allow_send(Role::Deacon, "sess").unwrap();
    let path = tmp.path().join("gt-mail-ratelimit").join("sess.json");
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
