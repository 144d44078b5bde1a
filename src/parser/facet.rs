// facet_wrap(...) / facet_grid(...) interpreter

use super::ast::Call;
use crate::error::Result;
use crate::facet::{Facet, FacetScales};

/// `facet_wrap(by: [a, b], ncol: 2, scales: "free_y")`, `facet_grid(rows: a, cols: b)`.
pub(super) fn facet(call: &Call) -> Result<Facet> {
    let args = call.named()?;
    let mut facet = if call.name == "facet_wrap" {
        let by = args
            .iter()
            .find(|(name, _)| *name == "by")
            .ok_or_else(|| call.error("requires 'by'"))?;
        Facet::wrap(&call.names("by", by.1)?)
    } else {
        let mut rows = None;
        let mut cols = None;
        for (name, value) in &args {
            match *name {
                "rows" => rows = Some(call.text(name, value)?),
                "cols" => cols = Some(call.text(name, value)?),
                _ => {}
            }
        }
        if rows.is_none() && cols.is_none() {
            return Err(call.error("requires 'rows' or 'cols'"));
        }
        Facet::grid(rows, cols)
    };

    let wrap = matches!(facet, Facet::Wrap { .. });
    for (name, value) in args {
        facet = match name {
            "by" if wrap => facet,
            "rows" | "cols" if !wrap => facet,
            "ncol" if wrap => facet.ncol(call.count(name, value)?),
            "nrow" if wrap => facet.nrow(call.count(name, value)?),
            "scales" => facet.with_scales(call.text(name, value)?.parse::<FacetScales>()?),
            _ => return Err(call.unknown(name)),
        };
    }
    Ok(facet)
}
