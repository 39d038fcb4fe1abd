//! Invite URL generation.
//!
//! The bot account is added to a community group through the platform's
//! OAuth flow; this module computes the permission set Cortado needs and
//! renders the authorize URL printed at startup.

/// Permission bits the relay needs:
/// view channels, send messages, embed links, attach files, read message
/// history, use application commands.
pub fn invite_permissions() -> u64 {
    let mut permissions: u64 = 0;
    permissions |= 1 << 10; // VIEW_CHANNEL
    permissions |= 1 << 11; // SEND_MESSAGES
    permissions |= 1 << 14; // EMBED_LINKS
    permissions |= 1 << 15; // ATTACH_FILES
    permissions |= 1 << 16; // READ_MESSAGE_HISTORY
    permissions |= 1 << 31; // USE_APPLICATION_COMMANDS
    permissions
}

/// Build the OAuth authorize URL for a client id. `permissions` defaults to
/// [`invite_permissions`].
pub fn invite_url(client_id: &str, permissions: Option<u64>) -> String {
    let permissions = permissions.unwrap_or_else(invite_permissions);
    format!(
        "https://discord.com/api/oauth2/authorize\
         ?client_id={client_id}\
         &permissions={permissions}\
         &scope=bot%20applications.commands"
    )
}
