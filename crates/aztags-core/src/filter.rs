//! Decides whether a resource may have its tags changed.
//!
//! Checks run in a fixed order and stop at the first match. Scope bounds,
//! exclusions, ID filters, the subscription rule and skip tags are deliberate
//! operator policy; the type checks at the end are data-quality warnings.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use regex::Regex;

use crate::capability::CapabilityTable;
use crate::error::{CoreError, Result};
use crate::identity::{Scope, normalize_id};
use crate::store::ActualResource;

/// Why a resource was left out of the change-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BelowMinScope,
    AboveMaxScope,
    Excluded,
    FilteredOut,
    Subscription,
    HasSkipTag,
    UnknownType,
    BadType,
    TypeNotInTable(String),
    Unsupported(String),
    DoesNotExist,
}

impl SkipReason {
    /// Verbosity level at which the reason is reported. `None` means it is a
    /// warning and always reported.
    pub fn severity(&self) -> Option<u8> {
        match self {
            Self::BelowMinScope | Self::AboveMaxScope => Some(4),
            Self::FilteredOut => Some(3),
            Self::Excluded | Self::Subscription | Self::HasSkipTag => Some(2),
            Self::UnknownType
            | Self::BadType
            | Self::TypeNotInTable(_)
            | Self::Unsupported(_)
            | Self::DoesNotExist => None,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity().is_none()
    }

    /// Whether a report at `verbosity` should show this reason.
    pub fn visible_at(&self, verbosity: u8) -> bool {
        self.severity().is_none_or(|level| verbosity >= level)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinScope => write!(f, "SKIPPING resource less than minscope"),
            Self::AboveMaxScope => write!(f, "SKIPPING resource exceeds maxscope"),
            Self::Excluded => write!(f, "SKIPPING excluded resource"),
            Self::FilteredOut => write!(f, "SKIPPING filtered out resource"),
            Self::Subscription => write!(f, "SKIPPING subscription resource ID"),
            Self::HasSkipTag => write!(f, "SKIPPING resource has one or more skipped tags"),
            Self::UnknownType => write!(f, "WARNING ignoring resource with unknown type"),
            Self::BadType => write!(f, "WARNING ignoring resource with bad type"),
            Self::TypeNotInTable(t) => write!(
                f,
                "WARNING ignoring resource as type not found in supported tag CSV [{t}]"
            ),
            Self::Unsupported(t) => write!(f, "WARNING ignoring untaggable resource type [{t}]"),
            Self::DoesNotExist => write!(f, "WARNING: Resource does not exist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Taggability {
    Taggable,
    Skip(SkipReason),
}

impl Taggability {
    pub fn is_taggable(&self) -> bool {
        matches!(self, Self::Taggable)
    }
}

/// Resource IDs the operator never wants touched.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    ids: HashSet<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a CSV whose single column is headed `id`.
    pub fn load<R: Read>(&mut self, source_name: &str, reader: R) -> Result<usize> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        if csv.headers()?.get(0) != Some("id") {
            return Err(CoreError::unrecognized_header(
                source_name,
                "first column must be id",
            ));
        }
        let mut count = 0;
        for record in csv.records() {
            if let Some(id) = record?.get(0).filter(|id| !id.is_empty()) {
                self.insert(id);
                count += 1;
            }
        }
        tracing::info!(source = source_name, count, "Parsed exclude file");
        Ok(count)
    }

    pub fn insert(&mut self, id: &str) {
        self.ids.insert(normalize_id(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Operator policy limiting which resources may be tagged.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    pub min_scope: Option<u32>,
    pub max_scope: Option<u32>,
    /// Every pattern must match the normalized ID.
    pub id_filters: Vec<Regex>,
    /// Resources carrying any of these tags are skipped.
    pub skip_tags: Vec<String>,
}

impl FilterPolicy {
    /// Compile ID filter patterns.
    pub fn with_id_filters<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.id_filters.push(Regex::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    fn filtered_out(&self, normalized: &str) -> bool {
        self.id_filters.iter().any(|re| !re.is_match(normalized))
    }
}

/// Combines policy, exclusions and the capability table.
#[derive(Debug, Clone, Default)]
pub struct TaggabilityFilter {
    policy: FilterPolicy,
    exclusions: ExclusionSet,
    capabilities: CapabilityTable,
}

impl TaggabilityFilter {
    pub fn new(policy: FilterPolicy, exclusions: ExclusionSet, capabilities: CapabilityTable) -> Self {
        Self {
            policy,
            exclusions,
            capabilities,
        }
    }

    pub fn check(&self, resource: &ActualResource) -> Taggability {
        match self.skip_reason(resource) {
            Some(reason) => Taggability::Skip(reason),
            None => Taggability::Taggable,
        }
    }

    fn skip_reason(&self, resource: &ActualResource) -> Option<SkipReason> {
        let id = &resource.id;
        let scope = id.scope().value();

        if self.policy.min_scope.is_some_and(|min| scope < min) {
            return Some(SkipReason::BelowMinScope);
        }
        if self.policy.max_scope.is_some_and(|max| scope > max) {
            return Some(SkipReason::AboveMaxScope);
        }
        if self.exclusions.contains(id.normalized()) || self.exclusions.contains(id.display()) {
            return Some(SkipReason::Excluded);
        }
        if self.policy.filtered_out(id.normalized()) {
            return Some(SkipReason::FilteredOut);
        }
        // Subscriptions are never tagged through this path.
        if resource.is_subscription || id.scope() == Scope::SUBSCRIPTION {
            return Some(SkipReason::Subscription);
        }
        if self
            .policy
            .skip_tags
            .iter()
            .any(|tag| resource.tags.contains_key(tag))
        {
            return Some(SkipReason::HasSkipTag);
        }

        let resource_type = match resource.resource_type.as_deref() {
            None => return Some(SkipReason::UnknownType),
            Some("") => return Some(SkipReason::BadType),
            Some(t) => t,
        };
        match self.capabilities.supports_tags(resource_type) {
            None => Some(SkipReason::TypeNotInTable(resource_type.to_string())),
            Some(false) => Some(SkipReason::Unsupported(resource_type.to_string())),
            Some(true) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ResourceId;
    use indexmap::IndexMap;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";

    fn resource(path: &str, resource_type: Option<&str>, tags: &[(&str, &str)]) -> ActualResource {
        ActualResource {
            id: ResourceId::parse(&format!("/subscriptions/{SUB}{path}")).unwrap(),
            resource_type: resource_type.map(str::to_string),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
            is_subscription: path.is_empty(),
        }
    }

    fn capabilities() -> CapabilityTable {
        [
            ("microsoft.web/sites".to_string(), true),
            ("microsoft.resources/resourcegroups".to_string(), true),
            ("microsoft.insights/alertrules".to_string(), false),
        ]
        .into_iter()
        .collect()
    }

    fn filter(policy: FilterPolicy) -> TaggabilityFilter {
        TaggabilityFilter::new(policy, ExclusionSet::new(), capabilities())
    }

    #[test]
    fn test_taggable_resource() {
        let site = resource("/resourceGroups/rg/providers/Microsoft.Web/sites/a", Some("microsoft.web/sites"), &[]);
        assert!(filter(FilterPolicy::default()).check(&site).is_taggable());
    }

    #[test]
    fn test_scope_bounds() {
        let rg = resource("/resourceGroups/rg", Some("microsoft.resources/resourcegroups"), &[]);
        let f = filter(FilterPolicy {
            min_scope: Some(5),
            ..Default::default()
        });
        assert_eq!(f.check(&rg), Taggability::Skip(SkipReason::BelowMinScope));

        let site = resource("/resourceGroups/rg/providers/Microsoft.Web/sites/a", Some("microsoft.web/sites"), &[]);
        let f = filter(FilterPolicy {
            max_scope: Some(4),
            ..Default::default()
        });
        assert_eq!(f.check(&site), Taggability::Skip(SkipReason::AboveMaxScope));
        assert!(f.check(&rg).is_taggable());
    }

    #[test]
    fn test_exclusions_match_either_form() {
        let rg = resource("/resourceGroups/Web", Some("microsoft.resources/resourcegroups"), &[]);
        let mut exclusions = ExclusionSet::new();
        exclusions
            .load(
                "exclude.csv",
                format!("id\n/subscriptions/{SUB}/resourceGroups/WEB\n").as_bytes(),
            )
            .unwrap();
        let f = TaggabilityFilter::new(FilterPolicy::default(), exclusions, capabilities());
        assert_eq!(f.check(&rg), Taggability::Skip(SkipReason::Excluded));
    }

    #[test]
    fn test_exclusion_header_checked() {
        let err = ExclusionSet::new().load("bad.csv", "resource\nx\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::UnrecognizedHeader { .. }));
    }

    #[test]
    fn test_id_filters_are_conjunctive() {
        let site = resource("/resourceGroups/Prod-Web/providers/Microsoft.Web/sites/a", Some("microsoft.web/sites"), &[]);
        let f = filter(FilterPolicy::default().with_id_filters(["prod-web", "sites"]).unwrap());
        assert!(f.check(&site).is_taggable(), "filters match the normalized id");

        let f = filter(FilterPolicy::default().with_id_filters(["prod-web", "vaults"]).unwrap());
        assert_eq!(f.check(&site), Taggability::Skip(SkipReason::FilteredOut));
    }

    #[test]
    fn test_subscription_never_taggable() {
        let sub = resource("", None, &[]);
        assert_eq!(
            filter(FilterPolicy::default()).check(&sub),
            Taggability::Skip(SkipReason::Subscription)
        );

        // Elements from the subscription listing are skipped even with a type.
        let mut listed = resource("/resourceGroups/rg", Some("microsoft.resources/resourcegroups"), &[]);
        listed.is_subscription = true;
        assert_eq!(
            filter(FilterPolicy::default()).check(&listed),
            Taggability::Skip(SkipReason::Subscription)
        );
    }

    #[test]
    fn test_skip_tags() {
        let site = resource(
            "/resourceGroups/rg/providers/Microsoft.Web/sites/a",
            Some("microsoft.web/sites"),
            &[("DoNotTag", "1")],
        );
        let f = filter(FilterPolicy {
            skip_tags: vec!["DoNotTag".into()],
            ..Default::default()
        });
        assert_eq!(f.check(&site), Taggability::Skip(SkipReason::HasSkipTag));
    }

    #[test]
    fn test_type_warnings() {
        let f = filter(FilterPolicy::default());
        let unknown = resource("/resourceGroups/rg/providers/a/b/c", None, &[]);
        assert_eq!(f.check(&unknown), Taggability::Skip(SkipReason::UnknownType));

        let missing = resource("/resourceGroups/rg/providers/a/b/c", Some("microsoft.new/things"), &[]);
        let Taggability::Skip(reason) = f.check(&missing) else {
            panic!("expected skip");
        };
        assert!(reason.is_warning());
        assert!(reason.to_string().contains("[microsoft.new/things]"));

        let unsupported = resource(
            "/resourceGroups/rg/providers/Microsoft.Insights/alertrules/x",
            Some("microsoft.insights/alertrules"),
            &[],
        );
        assert_eq!(
            f.check(&unsupported),
            Taggability::Skip(SkipReason::Unsupported("microsoft.insights/alertrules".into()))
        );
    }

    #[test]
    fn test_order_exclusion_before_type_checks() {
        let unknown = resource("/resourceGroups/rg/providers/a/b/c", None, &[]);
        let mut exclusions = ExclusionSet::new();
        exclusions.insert(unknown.id.display());
        let f = TaggabilityFilter::new(FilterPolicy::default(), exclusions, capabilities());
        assert_eq!(f.check(&unknown), Taggability::Skip(SkipReason::Excluded));
    }

    #[test]
    fn test_visibility_by_verbosity() {
        assert!(SkipReason::DoesNotExist.visible_at(0));
        assert!(!SkipReason::Excluded.visible_at(1));
        assert!(SkipReason::Excluded.visible_at(2));
        assert!(!SkipReason::BelowMinScope.visible_at(3));
    }
}
