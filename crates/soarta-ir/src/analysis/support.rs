use soarta_dsl::ast::{Production, ProductionFlag};

/// O-support: explicit `:o-support`, or any positive condition chain that
/// tests `operator`. `:i-support` always wins.
pub(super) fn o_support(production: &Production, mentions_operator: bool) -> bool {
    if production.has_flag(&ProductionFlag::ISupport) {
        return false;
    }
    production.has_flag(&ProductionFlag::OSupport) || mentions_operator
}
