//! Fragments that wire a generated domain into the application entry points.
//!
//! Formatting functions are pure; [`DomainWiring`] routes their output to the right marker pair.

use serde::Serialize;
use tracing::{debug, info};

use crate::app::document::SourceDocument;
use crate::app::markers::{blocks, end_of, start_of};
use crate::domain::errors::ScaffoldResult;
use crate::domain::model::{DomainNames, Injection, RouteGroup};
use crate::infra::config::WiringConfig;

/// Shared resource handle passed to every repository constructor.
pub const DB_HANDLE: &str = "db";

pub fn model_registration(names: &DomainNames) -> String {
    format!("&{}.{}{{}},", names.pkg_alias, names.model)
}

pub fn repository_var(names: &DomainNames) -> String {
    format!("{}Repo", names.var_name)
}

pub fn service_var(names: &DomainNames) -> String {
    format!("{}Service", names.var_name)
}

pub fn controller_var(names: &DomainNames) -> String {
    format!("{}Controller", names.var_name)
}

pub fn repository_instantiation(names: &DomainNames) -> String {
    format!(
        "{} := {}.NewRepository({DB_HANDLE})",
        repository_var(names),
        names.pkg_alias
    )
}

pub fn service_instantiation(names: &DomainNames) -> String {
    format!(
        "{} := {}.NewService({})",
        service_var(names),
        names.pkg_alias,
        repository_var(names)
    )
}

/// Controller constructor call; each related domain contributes its service as an extra argument.
pub fn controller_instantiation(names: &DomainNames, relations: &[DomainNames]) -> String {
    let args = std::iter::once(service_var(names))
        .chain(relations.iter().map(service_var))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} := {}.NewController({args})",
        controller_var(names),
        names.pkg_alias
    )
}

pub fn route_registration(names: &DomainNames, router_var: &str) -> String {
    format!("{}.RegisterRoutes({router_var})", controller_var(names))
}

/// Has-many field placed on `parent_model` pointing back at `child`.
pub fn relationship_field(parent_model: &str, child: &DomainNames) -> String {
    format!(
        "{} []{}.{} `gorm:\"foreignKey:{parent_model}ID\" json:\"{},omitempty\"`",
        pluralize(&child.model),
        child.pkg_alias,
        child.model,
        lower_first(&pluralize(&child.model)),
    )
}

/// Navigation menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub label: String,
    pub href: String,
    pub icon: Option<String>,
}

impl NavEntry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

pub fn nav_item(entry: &NavEntry, default_icon: &str) -> String {
    let icon = entry
        .icon
        .as_deref()
        .filter(|icon| !icon.trim().is_empty())
        .unwrap_or(default_icon);
    format!(
        "@components.NavItem(\"{}\", \"{}\", \"{icon}\")",
        entry.href,
        pluralize(&entry.label)
    )
}

/// English plural of the last word in `label`.
pub fn pluralize(label: &str) -> String {
    let trimmed = label.trim();
    let split = trimmed.rfind(' ').map(|idx| idx + 1).unwrap_or(0);
    let (head, word) = trimmed.split_at(split);
    if word.is_empty() {
        return trimmed.to_owned();
    }

    let lower = word.to_ascii_lowercase();
    let plural = if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        format!("{word}es")
    } else {
        format!("{word}s")
    };
    format!("{head}{plural}")
}

fn lower_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where a route registration ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTarget {
    pub block: String,
    pub router_var: String,
    pub injection: Injection,
}

/// Per-block outcome of [`DomainWiring::wire_domain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WiringReport {
    pub steps: Vec<WiringStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WiringStep {
    pub block: String,
    pub fragment: String,
    pub injection: Injection,
}

impl WiringReport {
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|step| step.injection.changed())
    }
}

/// Routes domain fragments into documents.
#[derive(Debug, Clone)]
pub struct DomainWiring {
    default_router: String,
    default_icon: String,
}

impl Default for DomainWiring {
    fn default() -> Self {
        Self::from_config(&WiringConfig::default())
    }
}

impl DomainWiring {
    pub fn from_config(config: &WiringConfig) -> Self {
        Self {
            default_router: config.default_router(),
            default_icon: config.default_icon(),
        }
    }

    pub fn register_model(
        &self,
        doc: &mut SourceDocument,
        names: &DomainNames,
    ) -> ScaffoldResult<Injection> {
        inject_block(doc, blocks::MODELS, &model_registration(names))
    }

    /// Instantiate repository, service, and controller in their respective blocks.
    pub fn register_dependencies(
        &self,
        doc: &mut SourceDocument,
        names: &DomainNames,
        relations: &[DomainNames],
    ) -> ScaffoldResult<Vec<WiringStep>> {
        let fragments = [
            (blocks::REPOS, repository_instantiation(names)),
            (blocks::SERVICES, service_instantiation(names)),
            (
                blocks::CONTROLLERS,
                controller_instantiation(names, relations),
            ),
        ];

        let mut steps = Vec::with_capacity(fragments.len());
        for (block, fragment) in fragments {
            let injection = inject_block(doc, block, &fragment)?;
            steps.push(WiringStep {
                block: block.to_owned(),
                fragment,
                injection,
            });
        }
        Ok(steps)
    }

    /// Register routes in the group's block, or the generic `ROUTES` block when the file has none.
    pub fn register_routes(
        &self,
        doc: &mut SourceDocument,
        names: &DomainNames,
        group: RouteGroup,
    ) -> ScaffoldResult<RouteTarget> {
        let group_block = group.routes_block();
        let (block, router_var) = if doc.has_pair(&start_of(group_block), &end_of(group_block)) {
            (group_block, group.router_var().to_owned())
        } else {
            debug!(group = %group, "group route markers missing, using generic block");
            (blocks::ROUTES, self.default_router.clone())
        };

        let injection = inject_block(doc, block, &route_registration(names, &router_var))?;
        Ok(RouteTarget {
            block: block.to_owned(),
            router_var,
            injection,
        })
    }

    pub fn add_relationship(
        &self,
        doc: &mut SourceDocument,
        parent_model: &str,
        child: &DomainNames,
    ) -> ScaffoldResult<Injection> {
        inject_block(
            doc,
            blocks::RELATIONSHIPS,
            &relationship_field(parent_model, child),
        )
    }

    /// Add a menu entry to the authenticated or admin navigation section.
    pub fn add_nav_item(
        &self,
        doc: &mut SourceDocument,
        entry: &NavEntry,
        group: RouteGroup,
    ) -> ScaffoldResult<Injection> {
        inject_block(doc, group.nav_block(), &nav_item(entry, &self.default_icon))
    }

    /// Apply model, dependency, and route wiring for one domain.
    ///
    /// Either every step succeeds or `doc` is left as it was.
    pub fn wire_domain(
        &self,
        doc: &mut SourceDocument,
        names: &DomainNames,
        relations: &[DomainNames],
        group: RouteGroup,
    ) -> ScaffoldResult<WiringReport> {
        let mut staged = doc.clone();
        let mut report = WiringReport::default();

        let injection = self.register_model(&mut staged, names)?;
        report.steps.push(WiringStep {
            block: blocks::MODELS.to_owned(),
            fragment: model_registration(names),
            injection,
        });

        report
            .steps
            .extend(self.register_dependencies(&mut staged, names, relations)?);

        let route = self.register_routes(&mut staged, names, group)?;
        report.steps.push(WiringStep {
            fragment: route_registration(names, &route.router_var),
            block: route.block,
            injection: route.injection,
        });

        *doc = staged;
        info!(model = %names.model, group = %group, changed = report.changed(), "wired domain");
        Ok(report)
    }
}

fn inject_block(doc: &mut SourceDocument, block: &str, fragment: &str) -> ScaffoldResult<Injection> {
    doc.inject_between(&start_of(block), &end_of(block), fragment)
}
