//! ActionRegistry — local mirror of the server's toggleable actions.

use remote_proto::protocol::{ActionInfo, ActionList, Payload};
use serde_json::{Map, Value};

use crate::error::ApplyError;

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    groups: ActionList,
    loaded: bool,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry with a freshly fetched list.
    pub fn load(&mut self, groups: ActionList) {
        self.groups = groups;
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: &str) -> Option<&ActionInfo> {
        self.groups.values().flatten().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ActionInfo> {
        self.groups.values_mut().flatten().find(|a| a.id == id)
    }

    /// Groups in name order.
    pub fn groups(&self) -> &ActionList {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a change set of `action id -> checked`.  Either every entry is
    /// applied or none is.  Returns the number of actions whose state
    /// actually changed.
    pub fn apply_changes(&mut self, changes: &Map<String, Value>) -> Result<usize, ApplyError> {
        if !self.loaded {
            return Err(ApplyError::NotLoaded);
        }

        let mut updates = Vec::with_capacity(changes.len());
        for (id, value) in changes {
            if self.get(id).is_none() {
                return Err(ApplyError::UnknownAction(id.clone()));
            }
            let checked = value
                .as_bool()
                .ok_or_else(|| ApplyError::BadValue(id.clone()))?;
            updates.push((id, checked));
        }

        let mut changed = 0;
        for (id, checked) in updates {
            if let Some(action) = self.get_mut(id) {
                if action.is_checked != checked {
                    action.is_checked = checked;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

/// Form payload that triggers an action on the server.
pub fn trigger_payload(id: &str) -> Payload {
    Payload::new().field("id", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(id: &str, checked: bool) -> ActionInfo {
        ActionInfo {
            id: id.to_string(),
            text: id.trim_start_matches("action").replace('_', " "),
            is_checkable: true,
            is_checked: checked,
        }
    }

    fn registry() -> ActionRegistry {
        let mut list = ActionList::new();
        list.insert(
            "Display Options".into(),
            vec![action("actionShow_Stars", true), action("actionShow_Planets", false)],
        );
        list.insert("Movement".into(), vec![action("actionGoto_Selected", false)]);
        let mut reg = ActionRegistry::new();
        reg.load(list);
        reg
    }

    fn changes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_not_loaded_rejects() {
        let mut reg = ActionRegistry::new();
        let err = reg
            .apply_changes(&changes(json!({"actionShow_Stars": true})))
            .unwrap_err();
        assert_eq!(err, ApplyError::NotLoaded);
    }

    #[test]
    fn test_empty_change_set_needs_load_only() {
        let mut reg = ActionRegistry::new();
        assert!(reg.apply_changes(&Map::new()).is_err());
        let mut reg = registry();
        assert_eq!(reg.apply_changes(&Map::new()), Ok(0));
    }

    #[test]
    fn test_apply_counts_real_changes() {
        let mut reg = registry();
        let n = reg
            .apply_changes(&changes(json!({
                "actionShow_Stars": true,
                "actionShow_Planets": true
            })))
            .unwrap();
        assert_eq!(n, 1);
        assert!(reg.get("actionShow_Planets").unwrap().is_checked);
    }

    #[test]
    fn test_unknown_action_leaves_state_untouched() {
        let mut reg = registry();
        let err = reg
            .apply_changes(&changes(json!({
                "actionShow_Planets": true,
                "actionShow_Comets": true
            })))
            .unwrap_err();
        assert_eq!(err, ApplyError::UnknownAction("actionShow_Comets".into()));
        assert!(!reg.get("actionShow_Planets").unwrap().is_checked);
    }

    #[test]
    fn test_non_boolean_value() {
        let mut reg = registry();
        let err = reg
            .apply_changes(&changes(json!({"actionShow_Stars": "yes"})))
            .unwrap_err();
        assert_eq!(err, ApplyError::BadValue("actionShow_Stars".into()));
    }

    #[test]
    fn test_trigger_payload() {
        assert_eq!(trigger_payload("actionShow_Stars").get("id"), Some("actionShow_Stars"));
        assert_eq!(registry().len(), 3);
    }
}
