use nanoid::nanoid;

/// Characters used in generated document ids; look-alike glyphs (0/O, 1/l/I) are left out.
const DOC_ID_ALPHABET: &[char] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q',
    'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q',
    'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const DOC_ID_LENGTH: usize = 20;

/// Random identifier for documents whose caller does not assign one.
pub fn generate_doc_id() -> String {
    nanoid!(DOC_ID_LENGTH, DOC_ID_ALPHABET)
}
