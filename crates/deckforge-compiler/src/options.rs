use uuid::Uuid;

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Tags stamped on every generated entity.
    /// `None` takes them from the document's `x-kong-tags`.
    pub tags: Option<Vec<String>>,
    /// Base document name. Falls back to `x-kong-name`, then `info.title`,
    /// then a random name.
    pub doc_name: Option<String>,
    /// Namespace for identifier derivation (default: the DNS namespace).
    pub uuid_namespace: Uuid,
    /// Insomnia-compatible naming: `-` as the only separator and unmodified
    /// capture names.
    pub inso_compat: bool,
    /// Do not emit `id` fields.
    pub skip_id: bool,
    /// Translate OpenID-Connect security requirements into plugins.
    pub oidc: bool,
    /// Degrade unsupported security configurations to "inherit" instead of failing.
    pub ignore_security_errors: bool,
    /// Accept documents whose component schemas reference themselves.
    pub ignore_circular_refs: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            tags: None,
            doc_name: None,
            uuid_namespace: Uuid::NAMESPACE_DNS,
            inso_compat: false,
            skip_id: false,
            oidc: false,
            ignore_security_errors: false,
            ignore_circular_refs: false,
        }
    }
}

impl CompileOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every entity with `tags` instead of the document's `x-kong-tags`.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Set the base document name.
    pub fn with_doc_name(mut self, name: impl Into<String>) -> Self {
        self.doc_name = Some(name.into());
        self
    }

    /// Set the identifier namespace.
    pub fn with_uuid_namespace(mut self, namespace: Uuid) -> Self {
        self.uuid_namespace = namespace;
        self
    }

    pub fn with_inso_compat(mut self, enabled: bool) -> Self {
        self.inso_compat = enabled;
        self
    }

    pub fn with_skip_id(mut self, enabled: bool) -> Self {
        self.skip_id = enabled;
        self
    }

    pub fn with_oidc(mut self, enabled: bool) -> Self {
        self.oidc = enabled;
        self
    }

    pub fn with_ignore_security_errors(mut self, enabled: bool) -> Self {
        self.ignore_security_errors = enabled;
        self
    }

    pub fn with_ignore_circular_refs(mut self, enabled: bool) -> Self {
        self.ignore_circular_refs = enabled;
        self
    }
}
