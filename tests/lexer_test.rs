//! Lexer tests: token forms, escapes, restartability, header scan.

use marea::parser::lexer::{read_header, Keyword, Lexer, Token};

fn tokens(data: &[u8]) -> Vec<Token> {
    Lexer::new(data).map(|(_, tok)| tok).collect()
}

#[test]
fn test_numbers() {
    assert_eq!(
        tokens(b"1 -2 +3 4.5 -4.5 .5 -.5 6."),
        vec![
            Token::Int(1),
            Token::Int(-2),
            Token::Int(3),
            Token::Real(4.5),
            Token::Real(-4.5),
            Token::Real(0.5),
            Token::Real(-0.5),
            Token::Real(6.0),
        ]
    );
}

#[test]
fn test_names_with_hex_escapes() {
    assert_eq!(
        tokens(b"/Name /A#42C /Lime#20Green /paired#28#29parentheses"),
        vec![
            Token::Name("Name".into()),
            Token::Name("ABC".into()),
            Token::Name("Lime Green".into()),
            Token::Name("paired()parentheses".into()),
        ]
    );
}

#[test]
fn test_literal_string_escapes() {
    assert_eq!(
        tokens(br"(simple)"),
        vec![Token::String(b"simple".to_vec())]
    );
    // Nested unescaped parentheses.
    assert_eq!(
        tokens(b"(a(b)c)"),
        vec![Token::String(b"a(b)c".to_vec())]
    );
    assert_eq!(
        tokens(b"(a\\nb\\tc\\\\d\\(e\\))"),
        vec![Token::String(b"a\nb\tc\\d(e)".to_vec())]
    );
    // Octal escapes: 1-3 digits, wrapping mod 256.
    assert_eq!(
        tokens(b"(\\101\\12\\7)"),
        vec![Token::String(b"A\n\x07".to_vec())]
    );
    assert_eq!(tokens(b"(\\400)"), vec![Token::String(vec![0x00])]);
    // Line continuation via backslash-EOL.
    assert_eq!(
        tokens(b"(split\\\nline)"),
        vec![Token::String(b"splitline".to_vec())]
    );
}

#[test]
fn test_hex_strings() {
    assert_eq!(
        tokens(b"<48 65 6C6C 6F>"),
        vec![Token::String(b"Hello".to_vec())]
    );
    // Odd nibble pads with zero.
    assert_eq!(tokens(b"<F>"), vec![Token::String(vec![0xF0])]);
}

#[test]
fn test_dict_and_array_delimiters() {
    assert_eq!(
        tokens(b"<< /K [1 2] >>"),
        vec![
            Token::DictStart,
            Token::Name("K".into()),
            Token::ArrayStart,
            Token::Int(1),
            Token::Int(2),
            Token::ArrayEnd,
            Token::DictEnd,
        ]
    );
}

#[test]
fn test_keywords_and_comments() {
    assert_eq!(
        tokens(b"BT % a comment to end of line\nET true false"),
        vec![
            Token::Keyword(Keyword::BT),
            Token::Keyword(Keyword::ET),
            Token::Bool(true),
            Token::Bool(false),
        ]
    );
    assert_eq!(
        tokens(b"T* f* W* frob"),
        vec![
            Token::Keyword(Keyword::TStar),
            Token::Keyword(Keyword::FStar),
            Token::Keyword(Keyword::WClipStar),
            Token::Keyword(Keyword::Unknown(b"frob".to_vec())),
        ]
    );
}

#[test]
fn test_lexer_restartable_at_token_boundaries() {
    // Tokenizing from any token boundary yields the same suffix as a
    // scan started earlier.
    let data = b"1 0 obj << /A (x) /B [1 2.5 /C] >> endobj";
    let mut lexer = Lexer::new(data);
    let mut boundary_tokens = Vec::new();
    while let Some(Ok((pos, tok))) = lexer.next_token() {
        boundary_tokens.push((pos, tok));
    }
    for i in 0..boundary_tokens.len() {
        let (pos, _) = boundary_tokens[i];
        let restarted: Vec<Token> = Lexer::at(data, pos).map(|(_, t)| t).collect();
        let expected: Vec<Token> = boundary_tokens[i..].iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(restarted, expected, "restart at offset {}", pos);
    }
}

#[test]
fn test_read_header() {
    let (version, offset) = read_header(b"%PDF-1.7\nrest").unwrap();
    assert_eq!(version, "1.7");
    assert_eq!(offset, 0);

    // Junk before the header is tolerated up to 4 KiB.
    let mut junk = b"GARBAGE BYTES ".to_vec();
    junk.extend_from_slice(b"%PDF-1.4\n");
    let (version, offset) = read_header(&junk).unwrap();
    assert_eq!(version, "1.4");
    assert_eq!(offset, 14);

    let mut too_much = vec![b'x'; 5000];
    too_much.extend_from_slice(b"%PDF-1.4\n");
    assert!(read_header(&too_much).is_err());
}
