use crate::models::group::Group;

/// Groups present when the store starts.
const BOOTSTRAP_GROUPS: &[(&str, &str)] = &[
    ("Engineering", "Software, data and infrastructure roles"),
    ("Design", "Product, visual and UX design roles"),
    ("Sales & Marketing", "Growth, account and brand roles"),
    ("Operations", "Finance, people and support roles"),
];

pub fn bootstrap_groups() -> Vec<Group> {
    BOOTSTRAP_GROUPS
        .iter()
        .map(|(name, description)| Group::new(name, Some(description)))
        .collect()
}
