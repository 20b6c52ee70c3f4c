use super::Formatter;

use cqn_core::{
    schema::{Element, Entity, Model, TypeTag},
    stmt::{Expr, OrderBy, Source},
    Result,
};

/// Names visible to the expressions of one query level.
pub(super) struct Scope<'a> {
    sources: Vec<ScopeSource<'a>>,

    /// Single-segment ORDER BY references. An alias-less column whose last
    /// path segment is in this list is projected under that name so the
    /// ORDER BY resolves to the output column.
    order_by_aliases: Vec<String>,
}

struct ScopeSource<'a> {
    /// Alias, or the entity name when not aliased
    name: String,

    /// `None` for derived tables
    entity: Option<&'a Entity>,
}

impl<'a> Scope<'a> {
    pub(super) fn new(model: &'a Model, from: &Source, order_by: &[OrderBy]) -> Result<Scope<'a>> {
        let mut sources = vec![];
        collect(model, from, &mut sources)?;

        let order_by_aliases = order_by
            .iter()
            .filter_map(|order_by| match order_by.expr.as_ref_path() {
                Some([name]) => Some(name.clone()),
                _ => None,
            })
            .collect();

        Ok(Scope {
            sources,
            order_by_aliases,
        })
    }

    pub(super) fn entity(entity: &'a Entity) -> Scope<'a> {
        Scope {
            sources: vec![ScopeSource {
                name: entity.name.clone(),
                entity: Some(entity),
            }],
            order_by_aliases: vec![],
        }
    }

    /// Resolves a column path against the sources of this scope.
    ///
    /// `[element]` matches the first source declaring the element.
    /// `[source, element]` matches by alias or entity name.
    pub(super) fn element(&self, path: &[String]) -> Option<&'a Element> {
        let stored = |entity: &'a Entity, name: &str| {
            entity
                .element(name)
                .filter(|element| element.primitive().is_some())
        };

        match path {
            [name] => self
                .sources
                .iter()
                .filter_map(|source| source.entity)
                .find_map(|entity| stored(entity, name.as_str())),
            [source, name] => self
                .sources
                .iter()
                .find(|candidate| candidate.name == *source)
                .and_then(|source| source.entity)
                .and_then(|entity| stored(entity, name.as_str())),
            _ => None,
        }
    }

    pub(super) fn is_order_by_alias(&self, name: &str) -> bool {
        self.order_by_aliases.iter().any(|alias| alias == name)
    }

    /// Entity sources with the name they are visible under.
    pub(super) fn entities(&self) -> impl Iterator<Item = (&str, &'a Entity)> + '_ {
        self.sources
            .iter()
            .filter_map(|source| source.entity.map(|entity| (source.name.as_str(), entity)))
    }

    pub(super) fn has_derived(&self) -> bool {
        self.sources.iter().any(|source| source.entity.is_none())
    }

    pub(super) fn is_single_source(&self) -> bool {
        self.sources.len() == 1
    }
}

fn collect<'a>(model: &'a Model, from: &Source, out: &mut Vec<ScopeSource<'a>>) -> Result<()> {
    match from {
        Source::Entity(source) => {
            let entity = model.entity(&source.name)?;
            out.push(ScopeSource {
                name: source.alias.clone().unwrap_or_else(|| source.name.clone()),
                entity: Some(entity),
            });
        }
        Source::Select { alias, .. } => out.push(ScopeSource {
            name: alias.clone(),
            entity: None,
        }),
        Source::Join(join) => {
            collect(model, &join.left, out)?;
            collect(model, &join.right, out)?;
        }
    }

    Ok(())
}

impl<'a> Formatter<'a> {
    pub(super) fn push_scope(&mut self, from: &Source, order_by: &[OrderBy]) -> Result<()> {
        let scope = Scope::new(self.compiler.model, from, order_by)?;
        self.scopes.push(scope);
        Ok(())
    }

    pub(super) fn push_entity_scope(&mut self, entity: &'a Entity) {
        self.scopes.push(Scope::entity(entity));
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(super) fn scope(&self) -> Option<&Scope<'a>> {
        self.scopes.last()
    }

    /// Resolves a column path, innermost scope first so correlated
    /// subqueries see the outer query's sources.
    pub(super) fn resolve(&self, path: &[String]) -> Option<&'a Element> {
        self.scopes.iter().rev().find_map(|scope| scope.element(path))
    }

    /// The element type of `expr` when it is a typed column reference.
    pub(super) fn type_of(&self, expr: &Expr) -> Option<TypeTag> {
        match expr {
            Expr::Ref(expr_ref) if !expr_ref.is_session_variable() => {
                self.resolve(&expr_ref.path).map(Element::tag)
            }
            _ => None,
        }
    }
}
