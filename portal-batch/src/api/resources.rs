//! Catalog of supported portal resources
//!
//! Each entry names the four remote methods of a resource family and carries
//! the strategy and mutation shapes the generic engine needs for it.

use super::mutation::{AddRule, DeleteRule, MutationRules, UpdateRule, UpdateShape};
use super::strategy::{EntityStrategy, ListParamNames};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: &'static str,
    pub list_method: &'static str,
    pub add_method: &'static str,
    pub update_method: &'static str,
    pub delete_method: &'static str,
    pub strategy: EntityStrategy,
    pub mutations: MutationRules,
}

const NAMES: &[&str] = &[
    "lists",
    "sections",
    "fields",
    "elements",
    "epics",
    "backlog",
    "orders",
    "basket-items",
    "crm-items",
];

impl Resource {
    /// Universal lists (`lists.get`)
    pub fn lists() -> Self {
        Self {
            name: "lists",
            list_method: "lists.get",
            add_method: "lists.add",
            update_method: "lists.update",
            delete_method: "lists.delete",
            strategy: EntityStrategy::offset("ID").with_param_names(ListParamNames::uppercase()),
            mutations: uppercase_rules(
                "IBLOCK_ID",
                UpdateShape::InjectKey,
                DeleteRule::Projected {
                    required: names(&["IBLOCK_TYPE_ID", "IBLOCK_ID"]),
                    optional: names(&["ELEMENT_ID"]),
                },
            ),
        }
    }

    /// List sections; records name their own section (`SECTION_ID` or `SECTION_CODE`)
    pub fn sections() -> Self {
        Self {
            name: "sections",
            list_method: "lists.section.get",
            add_method: "lists.section.add",
            update_method: "lists.section.update",
            delete_method: "lists.section.delete",
            strategy: EntityStrategy::offset("ID").with_param_names(ListParamNames::uppercase()),
            mutations: uppercase_rules(
                "SECTION_ID",
                UpdateShape::PassThrough,
                DeleteRule::Record {
                    required: names(&["IBLOCK_TYPE_ID"]),
                },
            ),
        }
    }

    /// List fields; `lists.field.get` answers with an object keyed by field id
    pub fn fields() -> Self {
        Self {
            name: "fields",
            list_method: "lists.field.get",
            add_method: "lists.field.add",
            update_method: "lists.field.update",
            delete_method: "lists.field.delete",
            strategy: EntityStrategy::offset("FIELD_ID").with_param_names(ListParamNames::uppercase()),
            mutations: uppercase_rules(
                "FIELD_ID",
                UpdateShape::PassThrough,
                DeleteRule::Record {
                    required: names(&["IBLOCK_TYPE_ID", "FIELD_ID"]),
                },
            ),
        }
    }

    /// List elements; ordering goes through `ELEMENT_ORDER`
    pub fn elements() -> Self {
        Self {
            name: "elements",
            list_method: "lists.element.get",
            add_method: "lists.element.add",
            update_method: "lists.element.update",
            delete_method: "lists.element.delete",
            strategy: EntityStrategy::offset("ID")
                .with_param_names(ListParamNames::new("ELEMENT_ORDER", "FILTER", "SELECT")),
            mutations: uppercase_rules(
                "ELEMENT_ID",
                UpdateShape::PassThrough,
                DeleteRule::Record {
                    required: names(&["IBLOCK_TYPE_ID"]),
                },
            ),
        }
    }

    pub fn epics() -> Self {
        Self {
            name: "epics",
            list_method: "tasks.api.scrum.epic.list",
            add_method: "tasks.api.scrum.epic.add",
            update_method: "tasks.api.scrum.epic.update",
            delete_method: "tasks.api.scrum.epic.delete",
            strategy: EntityStrategy::id_based("id"),
            mutations: MutationRules::id_and_fields(Some("fields")),
        }
    }

    /// Scrum backlog; add and update accept bare field records
    pub fn backlog() -> Self {
        Self {
            name: "backlog",
            list_method: "tasks.api.scrum.backlog.list",
            add_method: "tasks.api.scrum.backlog.add",
            update_method: "tasks.api.scrum.backlog.update",
            delete_method: "tasks.api.scrum.backlog.delete",
            strategy: EntityStrategy::id_based("id"),
            mutations: MutationRules::id_and_fields(None),
        }
    }

    pub fn sale_orders() -> Self {
        Self {
            name: "orders",
            list_method: "sale.order.list",
            add_method: "sale.order.add",
            update_method: "sale.order.update",
            delete_method: "sale.order.delete",
            strategy: EntityStrategy::id_based("id").with_payload_key("orders"),
            mutations: MutationRules::id_and_fields(Some("fields")),
        }
    }

    pub fn basket_items() -> Self {
        Self {
            name: "basket-items",
            list_method: "sale.basketitem.list",
            add_method: "sale.basketitem.add",
            update_method: "sale.basketitem.update",
            delete_method: "sale.basketitem.delete",
            strategy: EntityStrategy::id_based("id").with_payload_key("basketItems"),
            mutations: MutationRules::id_and_fields(Some("fields")),
        }
    }

    /// Smart-process items; every call also needs `entityTypeId`
    pub fn crm_items() -> Self {
        let mut mutations = MutationRules::id_and_fields(Some("fields"));
        mutations.delete = DeleteRule::Record {
            required: names(&["entityTypeId", "id"]),
        };
        Self {
            name: "crm-items",
            list_method: "crm.item.list",
            add_method: "crm.item.add",
            update_method: "crm.item.update",
            delete_method: "crm.item.delete",
            strategy: EntityStrategy::id_based("id").with_payload_key("items"),
            mutations,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        let resource = match name.to_ascii_lowercase().as_str() {
            "lists" => Self::lists(),
            "sections" => Self::sections(),
            "fields" => Self::fields(),
            "elements" => Self::elements(),
            "epics" => Self::epics(),
            "backlog" => Self::backlog(),
            "orders" => Self::sale_orders(),
            "basket-items" => Self::basket_items(),
            "crm-items" => Self::crm_items(),
            _ => return None,
        };
        Some(resource)
    }

    pub fn all_names() -> &'static [&'static str] {
        NAMES
    }

    pub fn all() -> Vec<Self> {
        NAMES.iter().filter_map(|name| Self::by_name(name)).collect()
    }
}

// The lists module methods all take `FIELDS` and identify records by
// upper-case parameters.
fn uppercase_rules(target_param: &str, shape: UpdateShape, delete: DeleteRule) -> MutationRules {
    MutationRules {
        add: AddRule {
            payload_key: Some("FIELDS".to_string()),
        },
        update: UpdateRule {
            payload_key: Some("FIELDS".to_string()),
            target_param: target_param.to_string(),
            shape,
        },
        delete,
    }
}

fn names(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| key.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::strategy::{PaginationMode, PayloadLocation};

    #[test]
    fn test_every_name_resolves() {
        for name in Resource::all_names() {
            let resource = Resource::by_name(name).unwrap();
            assert_eq!(resource.name, *name);
        }
        assert_eq!(Resource::all().len(), Resource::all_names().len());
        assert!(Resource::by_name("deals").is_none());
    }

    #[test]
    fn test_lists_family_is_offset_paged() {
        for resource in [Resource::lists(), Resource::sections(), Resource::fields(), Resource::elements()] {
            assert_eq!(resource.strategy.pagination(), PaginationMode::Offset);
            assert_eq!(resource.strategy.param_names().filter, "FILTER");
            assert_eq!(resource.mutations.add.payload_key.as_deref(), Some("FIELDS"));
        }
        assert_eq!(Resource::elements().strategy.param_names().order, "ELEMENT_ORDER");
    }

    #[test]
    fn test_sale_resources_nest_payload() {
        assert_eq!(
            Resource::sale_orders().strategy.payload(),
            &PayloadLocation::Key("orders".to_string())
        );
        assert_eq!(
            Resource::basket_items().strategy.payload(),
            &PayloadLocation::Key("basketItems".to_string())
        );
        assert_eq!(Resource::epics().strategy.payload(), &PayloadLocation::Root);
        assert_eq!(Resource::crm_items().strategy.pagination(), PaginationMode::IdBased);
    }
}
