//! Technology capability resolution. Stateless; never connects.

use log::debug;

use crate::{
   error::{BrokerError, Result},
   tag::{
      TagIdentity,
      technology::{Technology, TechnologyKind},
   },
};

/// Returns a connectable handle for `kind` if the tag advertises it and the
/// driver hands out a matching variant.
pub fn resolve(tag: &TagIdentity, kind: TechnologyKind) -> Result<Technology> {
   if !tag.tech_list().contains(&kind) {
      return Err(BrokerError::TechUnsupported(kind));
   }
   match tag.technology(kind) {
      Some(tech) if tech.kind() == kind => Ok(tech),
      Some(tech) => {
         debug!(
            "Driver for {} returned {} when asked for {kind}",
            tag.id_hex(),
            tech.kind()
         );
         Err(BrokerError::TechUnsupported(kind))
      },
      None => Err(BrokerError::TechUnsupported(kind)),
   }
}
