use super::NewCredentialInfo;

pub(crate) struct Prompt {
    pub title:       String,
    pub description: String,
}

fn prompt(description: String) -> Prompt {
    Prompt {
        title: "vaultauthn".to_string(),
        description,
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() { "(unknown)" } else { s }
}

pub(crate) fn new_credential_prompt(info: &NewCredentialInfo) -> Prompt {
    prompt(format!(
        "Save new passkey\n\nSite: {}\nAccount: {}\n\nPress OK to create, or Cancel to deny.",
        or_unknown(&info.credential_name),
        or_unknown(&info.user_name),
    ))
}

pub(crate) fn attach_credential_prompt(info: &NewCredentialInfo, login_name: &str) -> Prompt {
    prompt(format!(
        "Add passkey to login \"{login_name}\"\n\nSite: {}\nAccount: {}\n\nPress OK to attach, or Cancel to choose another.",
        or_unknown(&info.credential_name),
        or_unknown(&info.user_name),
    ))
}

pub(crate) fn excluded_credential_prompt(info: &NewCredentialInfo) -> Prompt {
    prompt(format!(
        "A passkey already exists\n\nSite: {}\nAccount: {}\n\nThis vault already holds a credential the site asked not to duplicate.",
        or_unknown(&info.credential_name),
        or_unknown(&info.user_name),
    ))
}

pub(crate) fn pick_credential_prompt(entry_name: &str, index: usize, total: usize) -> Prompt {
    prompt(format!(
        "Sign in with passkey ({index} of {total})\n\nEntry: {entry_name}\n\nPress OK to sign in, or Cancel to skip.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_credential_prompt_text() {
        let info = NewCredentialInfo { credential_name: "Example".into(), user_name: String::new() };
        let p = new_credential_prompt(&info);
        assert_eq!(p.title, "vaultauthn");
        assert!(p.description.contains("Site: Example"));
        assert!(p.description.contains("Account: (unknown)"));
    }

    #[test]
    fn test_pick_prompt_numbers_candidates() {
        let p = pick_credential_prompt("work", 2, 3);
        assert!(p.description.starts_with("Sign in with passkey (2 of 3)"));
        assert!(p.description.contains("Entry: work"));
    }
}
