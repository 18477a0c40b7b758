//! Print an OAuth2 invite link for the bot.
//!
//! Usage: cargo run --bin invite_link -- link [client_id]
//!
//! Without a client id the `DISCORD_CLIENT_ID` environment variable is used.

use serenity::all::Permissions;

/// What the bot needs: see channels, read history, connect and speak in voice.
fn required_permissions() -> Permissions {
    Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY | Permissions::CONNECT | Permissions::SPEAK
}

fn invite_url(client_id: &str) -> String {
    format!(
        "https://discord.com/oauth2/authorize?client_id={}&scope=bot&permissions={}",
        client_id,
        required_permissions().bits()
    )
}

fn usage() -> &'static str {
    "usage: invite_link <command>

Available commands:

   help: Show this help
   link [client_id]: Generate invite link for this bot"
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("link") => {
            let client_id = args
                .get(1)
                .cloned()
                .or_else(|| std::env::var("DISCORD_CLIENT_ID").ok());
            match client_id {
                Some(id) => println!("{}", invite_url(&id)),
                None => {
                    eprintln!("No client id given and DISCORD_CLIENT_ID is not set");
                    std::process::exit(1);
                }
            }
        }
        _ => println!("{}", usage()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_bits() {
        // VIEW_CHANNEL (1 << 10) | READ_MESSAGE_HISTORY (1 << 16) | CONNECT (1 << 20) | SPEAK (1 << 21)
        assert_eq!(required_permissions().bits(), 3_212_288);
    }

    #[test]
    fn test_invite_url() {
        assert_eq!(
            invite_url("1234"),
            "https://discord.com/oauth2/authorize?client_id=1234&scope=bot&permissions=3212288"
        );
    }
}
