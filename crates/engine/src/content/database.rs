use std::collections::HashMap;

use crate::content::EntityTemplate;
use crate::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub u32);

/// Immutable, validated set of enemy templates for one session.
#[derive(Debug, Default, Clone)]
pub struct TemplateDatabase {
    templates: Vec<EntityTemplate>,
    ids_by_name: HashMap<String, TemplateId>,
}

impl TemplateDatabase {
    pub fn from_templates(templates: Vec<EntityTemplate>) -> Result<Self, ConfigurationError> {
        let mut ids_by_name = HashMap::with_capacity(templates.len());
        for (idx, template) in templates.iter().enumerate() {
            template.validate()?;
            let id = TemplateId(idx as u32);
            if ids_by_name.insert(template.name.clone(), id).is_some() {
                return Err(ConfigurationError::DuplicateTemplate {
                    name: template.name.clone(),
                });
            }
        }
        Ok(Self {
            templates,
            ids_by_name,
        })
    }

    pub fn template_id_by_name(&self, name: &str) -> Option<TemplateId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn template(&self, id: TemplateId) -> Option<&EntityTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn templates(&self) -> &[EntityTemplate] {
        &self.templates
    }

    pub fn iter(&self) -> impl Iterator<Item = (TemplateId, &EntityTemplate)> {
        self.templates
            .iter()
            .enumerate()
            .map(|(idx, template)| (TemplateId(idx as u32), template))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
