/// Key layout for documents stored in Redis hashes.
///
/// Every document of an index lives under `{prefix}:{index}:{doc_id}`; the
/// index itself is created over the `{prefix}:{index}:` key prefix.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
    pub index: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str, index: &'a str) -> Self {
        Self { prefix, index }
    }

    pub fn index_prefix(&self) -> String {
        format!("{}:{}:", self.prefix, self.index)
    }

    pub fn document(&self, doc_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, self.index, doc_id)
    }

    /// Recover the document id from a full key, if the key belongs to this index.
    pub fn doc_id_from_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix)?
            .strip_prefix(':')?
            .strip_prefix(self.index)?
            .strip_prefix(':')
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_document_keys() {
        let ctx = KeyContext::new("docsift", "films");
        assert_eq!(ctx.document("abc"), "docsift:films:abc");
        assert_eq!(ctx.index_prefix(), "docsift:films:");
    }

    #[test]
    fn extracts_ids_from_keys() {
        let ctx = KeyContext::new("docsift", "films");
        assert_eq!(ctx.doc_id_from_key("docsift:films:abc:1"), Some("abc:1"));
        assert_eq!(ctx.doc_id_from_key("docsift:films:"), None);
        assert_eq!(ctx.doc_id_from_key("docsift:reviews:abc"), None);
    }
}
