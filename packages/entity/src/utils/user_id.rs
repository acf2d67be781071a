/// Server name of a Matrix user ID (`@localpart:server.name[:port]`).
///
/// Everything after the first colon is the server name, port included.
/// Returns `None` when the sigil, the colon or either part is missing.
pub fn server_name(user_id: &str) -> Option<&str> {
    let rest = user_id.strip_prefix('@')?;
    let (localpart, server) = rest.split_once(':')?;
    if localpart.is_empty() || server.is_empty() {
        return None;
    }
    Some(server)
}
