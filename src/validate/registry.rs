use super::Validator;
use crate::config::{code_matches, ValidateConfig};
use crate::{ContentError, ContentResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Every known validator keyed by error code. Frozen after construction.
#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<&'static str, Arc<dyn Validator>>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.validators.keys()).finish()
    }
}

impl ValidatorRegistry {
    /// Fails on the first error code registered twice.
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> ContentResult<Self> {
        let mut table = BTreeMap::new();
        for validator in validators {
            let code = validator.error_code();
            if table.insert(code, validator).is_some() {
                return Err(ContentError::DuplicateErrorCode(code.to_string()));
            }
        }
        Ok(Self { validators: table })
    }

    /// The built-in rule catalogue.
    pub fn with_defaults() -> ContentResult<Self> {
        Self::new(crate::validators::all())
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.validators.keys().copied().collect()
    }

    pub fn get(&self, code: &str) -> Option<&Arc<dyn Validator>> {
        self.validators.get(code)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validators left after the allow/deny lists and the execution mode.
    /// List entries that name no known code or family are configuration
    /// errors.
    pub fn select(&self, config: &ValidateConfig) -> ContentResult<Vec<Arc<dyn Validator>>> {
        for entry in config.select.iter().chain(config.ignore.iter()).chain(config.warning.iter()) {
            if !self.validators.keys().any(|code| code_matches(std::slice::from_ref(entry), code)) {
                return Err(ContentError::UnknownErrorCode(entry.clone()));
            }
        }
        let selected = self
            .validators
            .values()
            .filter(|validator| config.select.is_empty() || code_matches(&config.select, validator.error_code()))
            .filter(|validator| !code_matches(&config.ignore, validator.error_code()))
            .filter(|validator| validator.info().runs_in(config.execution_mode))
            .cloned()
            .collect::<Vec<_>>();
        debug!(
            selected = selected.len(),
            known = self.validators.len(),
            mode = config.execution_mode.as_str(),
            "validators selected"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentItem;
    use crate::validate::{ValidationContext, ValidationResult, ValidatorInfo};

    struct Dummy(&'static ValidatorInfo);

    impl Validator for Dummy {
        fn info(&self) -> &'static ValidatorInfo {
            self.0
        }

        fn obtain_invalid_content_items(
            &self,
            _items: &[&ContentItem],
            _ctx: &ValidationContext<'_>,
        ) -> Vec<ValidationResult> {
            Vec::new()
        }
    }

    const FIRST: ValidatorInfo = ValidatorInfo {
        error_code: "BA100",
        ..ValidatorInfo::DEFAULT
    };
    const SECOND: ValidatorInfo = ValidatorInfo {
        error_code: "IN100",
        ..ValidatorInfo::DEFAULT
    };

    #[test]
    fn duplicate_codes_are_fatal() {
        let result = ValidatorRegistry::new(vec![
            Arc::new(Dummy(&FIRST)) as Arc<dyn Validator>,
            Arc::new(Dummy(&FIRST)),
        ]);
        assert!(matches!(result, Err(ContentError::DuplicateErrorCode(code)) if code == "BA100"));
    }

    #[test]
    fn selection_honours_prefixes_and_unknown_codes() {
        let registry =
            ValidatorRegistry::new(vec![Arc::new(Dummy(&FIRST)) as Arc<dyn Validator>, Arc::new(Dummy(&SECOND))])
                .expect("registry");
        let mut config = ValidateConfig::default();
        config.select = vec!["BA".to_string()];
        let selected = registry.select(&config).expect("select");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].error_code(), "BA100");

        config.select = vec!["ZZ999".to_string()];
        assert!(matches!(registry.select(&config), Err(ContentError::UnknownErrorCode(_))));
    }

    #[test]
    fn default_catalogue_has_unique_codes() {
        let registry = ValidatorRegistry::with_defaults().expect("defaults");
        assert!(registry.get("BA108").is_some());
        assert!(registry.get("GR106").is_some());
    }
}
