use mailbox_shared::constants::UNLOCK_PASSPHRASE;

/// Help text for the mailbox owner on how to invite writers.
///
/// `url` is the public address the client is served from; when it is blank
/// the owner is told to copy it from wherever they opened the mailbox.
pub fn share_instructions(url: &str) -> String {
    let link = match url.trim() {
        "" => "the address you opened this mailbox from".to_string(),
        url => url.to_string(),
    };
    format!(
        "How to invite friends:\n\
         - Send them {link}. It opens on the write view, no account needed.\n\
         - Only you should open the read view. The passphrase is {UNLOCK_PASSPHRASE}."
    )
}
