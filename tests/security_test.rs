//! Standard security handler tests: RC4 (R3) and AES-128 (R4)
//! documents are built with forward encryption, then opened with the
//! library decrypting transparently.

mod common;

use common::{hex_string, PdfBuilder};
use marea::codec::aes::aes_cbc_encrypt;
use marea::codec::arcfour::Arcfour;
use marea::{open, open_with_password, PdfError};

const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const DOCID: &[u8] = b"0123456789abcdef";
const P: i64 = -3904;

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

/// Algorithm 3.3: the /O value from the owner and user passwords.
fn compute_o(owner: &[u8], user: &[u8]) -> Vec<u8> {
    let mut hash = md5::compute(pad_password(owner)).0.to_vec();
    for _ in 0..50 {
        hash = md5::compute(&hash).0.to_vec();
    }
    let key = &hash[..16];
    let mut data = pad_password(user).to_vec();
    for i in 0..20u8 {
        let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        data = Arcfour::new(&xor_key).process(&data);
    }
    data
}

/// Algorithm 3.2: the file encryption key (128-bit, R3/R4).
fn compute_file_key(user: &[u8], o: &[u8]) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(pad_password(user));
    context.consume(o);
    context.consume((P as u32).to_le_bytes());
    context.consume(DOCID);
    let mut result = context.compute().0.to_vec();
    for _ in 0..50 {
        result = md5::compute(&result[..16]).0.to_vec();
    }
    result[..16].to_vec()
}

/// Algorithm 3.5: the /U value for R3/R4.
fn compute_u(key: &[u8]) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(PASSWORD_PADDING);
    context.consume(DOCID);
    let hash = context.compute();
    let mut result = Arcfour::new(key).process(&hash.0);
    for i in 1..20u8 {
        let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        result = Arcfour::new(&xor_key).process(&result);
    }
    let mut padded = result.clone();
    padded.extend_from_slice(&result);
    padded.truncate(32);
    padded
}

fn object_key(file_key: &[u8], objid: u32, genno: u32, aes: bool) -> Vec<u8> {
    let mut key_data = file_key.to_vec();
    key_data.extend_from_slice(&objid.to_le_bytes()[..3]);
    key_data.extend_from_slice(&genno.to_le_bytes()[..2]);
    if aes {
        key_data.extend_from_slice(b"sAlT");
    }
    let hash = md5::compute(&key_data);
    hash.0[..(file_key.len() + 5).min(16)].to_vec()
}

fn encrypt_string_rc4(file_key: &[u8], objid: u32, text: &[u8]) -> Vec<u8> {
    Arcfour::new(&object_key(file_key, objid, 0, false)).process(text)
}

fn encrypt_string_aes(file_key: &[u8], objid: u32, text: &[u8]) -> Vec<u8> {
    let key = object_key(file_key, objid, 0, true);
    let iv = [0x42u8; 16];
    let pad = 16 - text.len() % 16;
    let mut plain = text.to_vec();
    plain.extend(std::iter::repeat(pad as u8).take(pad));
    let mut out = iv.to_vec();
    out.extend(aes_cbc_encrypt(&key, &iv, &plain));
    out
}

fn encrypted_pdf_rc4(owner: &str) -> (Vec<u8>, Vec<u8>) {
    let o = compute_o(owner.as_bytes(), b"");
    let file_key = compute_file_key(b"", &o);
    let u = compute_u(&file_key);
    let title = encrypt_string_rc4(&file_key, 4, b"Top Secret");

    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R /Info 4 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(4, format!("<< /Title {} >>", hex_string(&title)).as_bytes())
        .add(
            5,
            format!(
                "<< /Filter /Standard /V 2 /R 3 /Length 128 /P {} /O {} /U {} >>",
                P,
                hex_string(&o),
                hex_string(&u)
            )
            .as_bytes(),
        )
        .trailer_extra(
            format!(
                "/Encrypt 5 0 R /ID [{} {}] ",
                hex_string(DOCID),
                hex_string(DOCID)
            )
            .as_bytes(),
        );
    (builder.build(1), file_key)
}

fn encrypted_pdf_aes128() -> Vec<u8> {
    let o = compute_o(b"hunter2", b"");
    let file_key = compute_file_key(b"", &o);
    let u = compute_u(&file_key);
    let title = encrypt_string_aes(&file_key, 4, b"Secret");

    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R /Info 4 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        )
        .add(3, b"<< /Type /Page /Parent 2 0 R >>")
        .add(4, format!("<< /Title {} >>", hex_string(&title)).as_bytes())
        .add(
            5,
            format!(
                "<< /Filter /Standard /V 4 /R 4 /Length 128 /P {} /O {} /U {} \
                 /CF << /StdCF << /CFM /AESV2 /Length 16 >> >> /StmF /StdCF /StrF /StdCF >>",
                P,
                hex_string(&o),
                hex_string(&u)
            )
            .as_bytes(),
        )
        .trailer_extra(
            format!(
                "/Encrypt 5 0 R /ID [{} {}] ",
                hex_string(DOCID),
                hex_string(DOCID)
            )
            .as_bytes(),
        );
    builder.build(1)
}

#[test]
fn test_rc4_empty_user_password() {
    let (pdf, _) = encrypted_pdf_rc4("owner");
    let doc = open(pdf).unwrap();
    assert!(doc.is_encrypted());
    let info = doc.resolve(doc.catalog().get("Info").unwrap());
    let title = info.as_dict().unwrap().get("Title").unwrap().clone();
    assert_eq!(title.as_string().unwrap(), b"Top Secret");
}

#[test]
fn test_rc4_owner_password() {
    let (pdf, _) = encrypted_pdf_rc4("owner");
    let doc = open_with_password(pdf, "owner").unwrap();
    let info = doc.resolve(doc.catalog().get("Info").unwrap());
    assert_eq!(
        info.as_dict().unwrap().get("Title").unwrap().as_string().unwrap(),
        b"Top Secret"
    );
}

#[test]
fn test_aes128_transparent_decryption() {
    // A document encrypted with Standard revision 4 (AES-128) and the
    // empty user password decrypts transparently.
    let doc = open(encrypted_pdf_aes128()).unwrap();
    assert!(doc.is_encrypted());
    let info = doc.resolve(doc.catalog().get("Info").unwrap());
    let title = info.as_dict().unwrap().get("Title").unwrap().clone();
    assert_eq!(title.as_string().unwrap(), b"Secret");
}

#[test]
fn test_wrong_password_is_fatal() {
    let (pdf, _) = encrypted_pdf_rc4("owner");
    // A user password that matches neither /U nor /O fails open().
    let err = open_with_password(pdf, "wrong horse battery").unwrap_err();
    assert!(matches!(err, PdfError::Crypt { .. }));
}

#[test]
fn test_encrypt_dict_itself_not_decrypted() {
    let (pdf, _) = encrypted_pdf_rc4("owner");
    let doc = open(pdf).unwrap();
    let encrypt = doc.getobj(5);
    let o = encrypt.as_dict().unwrap().get("O").unwrap().clone();
    // The /O value round-trips unmangled.
    assert_eq!(o.as_string().unwrap().len(), 32);
    assert_eq!(o.as_string().unwrap(), compute_o(b"owner", b"").as_slice());
}

#[test]
fn test_unsupported_revision_aborts_open() {
    let mut builder = PdfBuilder::new();
    builder
        .add(1, b"<< /Type /Catalog /Pages 2 0 R >>")
        .add(
            2,
            b"<< /Type /Pages /Kids [] /Count 0 /MediaBox [0 0 100 100] >>",
        )
        .add(
            5,
            b"<< /Filter /Standard /V 9 /R 9 /O (x) /U (x) /P -1 >>",
        )
        .trailer_extra(b"/Encrypt 5 0 R /ID [<00> <00>] ");
    let err = open(builder.build(1)).unwrap_err();
    assert!(matches!(err, PdfError::Unsupported { .. }));
}
