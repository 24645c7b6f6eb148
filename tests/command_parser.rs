use relaychat::relay::commands::{parse_port, ClientCommand, ConsoleCommand, Directive};
use relaychat::ChatError;

#[test]
fn test_plain_text_is_not_a_directive() {
    assert_eq!(Directive::parse("hello #world"), None);
    assert_eq!(Directive::parse(""), None);
}

#[test]
fn test_directive_splits_on_whitespace() {
    let d = Directive::parse("  #sethost   example.org  extra ").unwrap();
    assert_eq!(d.name, "#sethost");
    assert_eq!(d.args, vec!["example.org", "extra"]);
    assert_eq!(d.arg(0), Some("example.org"));
    assert_eq!(d.arg(2), None);
}

#[test]
fn test_console_commands() {
    let parse = |s| ConsoleCommand::from_directive(&Directive::parse(s).unwrap());
    assert_eq!(parse("#quit"), ConsoleCommand::Quit);
    assert_eq!(parse("#stop"), ConsoleCommand::Stop);
    assert_eq!(parse("#close"), ConsoleCommand::Close);
    assert_eq!(parse("#start"), ConsoleCommand::Start);
    assert_eq!(parse("#getport"), ConsoleCommand::GetPort);
    assert_eq!(parse("#setport 6000"), ConsoleCommand::SetPort(Some("6000")));
    assert_eq!(parse("#setport"), ConsoleCommand::SetPort(None));
    assert_eq!(parse("#sethost x"), ConsoleCommand::Unknown);
}

#[test]
fn test_client_commands() {
    let parse = |s| ClientCommand::from_directive(&Directive::parse(s).unwrap());
    assert_eq!(parse("#quit"), ClientCommand::Quit);
    assert_eq!(parse("#logoff"), ClientCommand::Logoff);
    assert_eq!(parse("#login"), ClientCommand::Login);
    assert_eq!(parse("#gethost"), ClientCommand::GetHost);
    assert_eq!(parse("#getport"), ClientCommand::GetPort);
    assert_eq!(parse("#sethost h"), ClientCommand::SetHost(Some("h")));
    assert_eq!(parse("#setport 1"), ClientCommand::SetPort(Some("1")));
    assert_eq!(parse("#stop"), ClientCommand::Unknown);
}

#[test]
fn test_setport_requires_hash_prefix() {
    assert_eq!(Directive::parse("setPort 5555"), None);
    let d = Directive::parse("#setPort 5555").unwrap();
    assert_eq!(ClientCommand::from_directive(&d), ClientCommand::Unknown);
}

#[test]
fn test_parse_port() {
    assert_eq!(parse_port("5555").unwrap(), 5555);
    assert!(matches!(parse_port("abc"), Err(ChatError::InvalidPort(_))));
    assert!(matches!(parse_port("65536"), Err(ChatError::InvalidPort(_))));
    assert!(matches!(parse_port("-1"), Err(ChatError::InvalidPort(_))));
}
