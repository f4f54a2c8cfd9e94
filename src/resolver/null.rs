use crate::core::types::TaxonId;
use crate::error::LookupError;
use crate::resolver::{IdResolver, Resolution, ResolvedTaxon};

/// Resolver for fully offline operation: every key is reported as not found
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl IdResolver for NullResolver {
    fn name(&self) -> &str {
        "none"
    }

    fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        Ok(vec![Resolution::NotFound; names.len()])
    }

    fn resolve_lineage(
        &self,
        ids: &[TaxonId],
    ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
        Ok(vec![Resolution::NotFound; ids.len()])
    }

    fn resolve_id_from_item_id(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        Ok(vec![Resolution::NotFound; item_ids.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_resolver_finds_nothing() {
        let resolver = NullResolver;
        let names = vec!["Fungi".to_string(), "Metazoa".to_string()];
        assert_eq!(
            resolver.resolve_by_name(&names).unwrap(),
            vec![Resolution::NotFound, Resolution::NotFound]
        );
        assert!(resolver.resolve_lineage(&[]).unwrap().is_empty());
    }
}
