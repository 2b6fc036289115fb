use agbridge_core::*;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_resolve_data_dir_explicit_wins() {
    unsafe {
        env::set_var("AGBRIDGE_PATH", "/env/data");
    }

    let result = resolve_data_dir(Some("/explicit/data")).unwrap();
    assert_eq!(result, PathBuf::from("/explicit/data"));

    unsafe {
        env::remove_var("AGBRIDGE_PATH");
    }
}

#[test]
fn test_expand_tilde_leaves_absolute_paths() {
    assert_eq!(expand_tilde("/var/tmp"), PathBuf::from("/var/tmp"));

    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_tilde("~/.claude"), home.join(".claude"));
    }
}

#[test]
fn test_encode_project_dir() {
    assert_eq!(
        encode_project_dir(Path::new("/home/user/my.project")),
        "-home-user-my-project"
    );
    assert_eq!(encode_project_dir(Path::new("/srv/app")), "-srv-app");
}

#[test]
fn test_decode_project_dir() {
    assert_eq!(decode_project_dir("-home-user-project"), "/home/user/project");
    assert_eq!(decode_project_dir("-srv"), "/srv");
    assert_eq!(decode_project_dir(""), "");
}

#[test]
fn test_decode_is_stable_for_encoded_paths() {
    let encoded = encode_project_dir(Path::new("/srv/app/api"));
    let decoded = decode_project_dir(&encoded);
    assert_eq!(decoded, "/srv/app/api");
    assert_eq!(encode_project_dir(Path::new(&decoded)), encoded);
}
