use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::Value;

use crate::model::{CreateDictionary, Dictionary, ModifyDictionary};
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;

const TABLE: &str = "dictionaries";
const SORTABLE: &[&str] = &["name", "created_at", "updated_at"];

fn indexes(dictionary: &Dictionary) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::from(dictionary.name.as_str())),
        ("superior_id", Value::from(dictionary.superior_id.as_deref())),
        ("enabled", Value::from(dictionary.enabled)),
        ("updated_at", Value::from(dictionary.updated_at.as_str())),
    ]
}

impl AdminService {
    pub fn create_dictionary(&self, input: CreateDictionary) -> Result<Dictionary, AdminError> {
        require(&input.name, "dictionary name")?;
        let superior_id = input.superior_id.filter(|s| !s.is_empty());
        if let Some(ref superior) = superior_id {
            self.fetch_dictionary(superior)?;
        }
        if self.dictionary_exists(&input.name, superior_id.as_deref(), None)? {
            return Err(AdminError::Conflict(format!("dictionary {} already exists", input.name)));
        }

        let now = now_rfc3339();
        let dictionary = Dictionary {
            id: new_id(),
            name: input.name,
            superior_id,
            description: input.description,
            enabled: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let mut idx = indexes(&dictionary);
        idx.push(("created_at", Value::Text(now)));
        records::insert(self.sql.as_ref(), TABLE, &dictionary.id, &dictionary, &idx)?;
        Ok(dictionary)
    }

    pub fn fetch_dictionary(&self, id: &str) -> Result<Dictionary, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    pub fn retrieve_dictionaries(&self, params: &ListParams) -> Result<ListResult<Dictionary>, AdminError> {
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &[], params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    /// Whether `name` is taken among the children of `superior_id`.
    pub fn dictionary_exists(
        &self,
        name: &str,
        superior_id: Option<&str>,
        exclude_id: Option<&str>,
    ) -> Result<bool, AdminError> {
        records::exists(
            self.sql.as_ref(),
            TABLE,
            "name",
            name,
            exclude_id,
            &[("superior_id", Value::from(superior_id))],
        )
    }

    pub fn modify_dictionary(&self, id: &str, patch: ModifyDictionary) -> Result<Dictionary, AdminError> {
        let mut dictionary = self.fetch_dictionary(id)?;
        let old_name = dictionary.name.clone();
        dictionary.apply(patch);
        require(&dictionary.name, "dictionary name")?;
        if dictionary.name != old_name
            && self.dictionary_exists(&dictionary.name, dictionary.superior_id.as_deref(), Some(id))?
        {
            return Err(AdminError::Conflict(format!("dictionary {} already exists", dictionary.name)));
        }
        dictionary.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &dictionary, &indexes(&dictionary))?;
        Ok(dictionary)
    }

    /// Delete an entry. Categories that still hold values are refused.
    pub fn remove_dictionary(&self, id: &str) -> Result<(), AdminError> {
        let dictionary = self.fetch_dictionary(id)?;
        if !self.dictionary_subset(Some(id))?.is_empty() {
            return Err(AdminError::Conflict(format!(
                "dictionary {} still has entries",
                dictionary.name
            )));
        }
        records::delete(self.sql.as_ref(), TABLE, id)
    }

    pub fn enable_dictionary(&self, id: &str) -> Result<Dictionary, AdminError> {
        let mut dictionary = self.fetch_dictionary(id)?;
        dictionary.enabled = !dictionary.enabled;
        dictionary.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &dictionary, &indexes(&dictionary))?;
        Ok(dictionary)
    }

    /// Children of `superior_id`; the categories when `None`.
    pub fn dictionary_subset(&self, superior_id: Option<&str>) -> Result<Vec<Dictionary>, AdminError> {
        let superior_id = superior_id.filter(|s| !s.is_empty());
        records::all(self.sql.as_ref(), TABLE, &[("superior_id", Value::from(superior_id))])
    }
}
