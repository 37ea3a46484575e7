//! Passphrase gate in front of the read view.
//!
//! This is cosmetic access control only.  The passphrase is a plaintext
//! literal compiled into the client and compared without hashing, rate
//! limiting or lockout; anyone with the binary can read it.  Nothing stored
//! behind the gate should be considered confidential.

use mailbox_shared::constants::UNLOCK_PASSPHRASE;

/// Unlock state for one session.  Always starts locked and is never persisted.
#[derive(Debug, Clone)]
pub struct MailboxGate {
    passphrase: &'static str,
    unlocked: bool,
}

impl MailboxGate {
    pub fn new() -> Self {
        Self {
            passphrase: UNLOCK_PASSPHRASE,
            unlocked: false,
        }
    }

    /// Compare `candidate` to the passphrase by exact equality.
    ///
    /// A match unlocks the gate for the rest of the session; a mismatch
    /// leaves the state untouched.
    pub fn unlock(&mut self, candidate: &str) -> bool {
        let matched = candidate == self.passphrase;
        if matched {
            self.unlocked = true;
        }
        matched
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }
}

impl Default for MailboxGate {
    fn default() -> Self {
        Self::new()
    }
}
