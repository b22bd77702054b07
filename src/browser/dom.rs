use serde::Deserialize;

/// One element as reported by the driver's `extract` command, in document order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DomElement {
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(rename = "ariaLabel", default)]
    pub aria_label: Option<String>,
    #[serde(rename = "testId", default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
}

impl DomElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_test_id(mut self, test_id: &str) -> Self {
        self.test_id = Some(test_id.to_string());
        self
    }

    pub fn with_attr(mut self, attr: &str, value: &str) -> Self {
        let value = Some(value.to_string());
        match attr {
            "id" => self.id = value,
            "class" => self.class = value,
            "name" => self.name = value,
            "placeholder" => self.placeholder = value,
            "aria-label" => self.aria_label = value,
            "data-testid" => self.test_id = value,
            "role" => self.role = value,
            "type" => self.r#type = value,
            "href" => self.href = value,
            _ => {}
        }
        self
    }
}
