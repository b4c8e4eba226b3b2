use super::integration::{Argument, Output};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub script_type: Option<String>,
    pub subtype: Option<String>,
    pub docker_image: Option<String>,
    pub args: Vec<Argument>,
    pub outputs: Vec<Output>,
    pub runas: Option<String>,
    pub tags: Vec<String>,
    pub is_llm: bool,
    pub compliantpolicies: Vec<String>,
    pub skip_prepare: Vec<String>,
}

impl Script {
    pub fn skips(&self, preparation: &str) -> bool {
        self.skip_prepare.iter().any(|entry| entry == preparation)
    }
}
