//! The session-scoped entity graph handed over by the scraping layer.
//!
//! The graph is a rooted forest (Person → Booking → {Arrest, Charge, Hold},
//! Charge → {Bond, Sentence}) stored arena-style: one flat list per entity
//! kind, linked parent→child by session-local string ids. Local ids carry no
//! meaning outside the session; they are never persisted.
//!
//! The graph is a plain value. It is validated while it is walked by the
//! session controller, not on construction, so malformed graphs (dangling
//! references, orphaned children) surface as rejection errors at commit time.

use serde::{Deserialize, Serialize};

use crate::entity::{
  ArrestFields, BondFields, BookingFields, ChargeFields, EntityFields as _,
  HoldFields, PersonFields, SentenceFields,
};

/// A session-local reference identifier. Usually whatever id the source page
/// exposes; unique only within one scrape session.
pub type LocalId = String;

// ─── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPerson {
  pub local_id: LocalId,
  pub fields:   PersonFields,
  #[serde(default)]
  pub bookings: Vec<LocalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedBooking {
  pub local_id: LocalId,
  pub fields:   BookingFields,
  #[serde(default)]
  pub arrest:   Option<LocalId>,
  #[serde(default)]
  pub charges:  Vec<LocalId>,
  #[serde(default)]
  pub holds:    Vec<LocalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedArrest {
  pub local_id: LocalId,
  pub fields:   ArrestFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedCharge {
  pub local_id: LocalId,
  pub fields:   ChargeFields,
  #[serde(default)]
  pub bond:     Option<LocalId>,
  #[serde(default)]
  pub sentence: Option<LocalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedHold {
  pub local_id: LocalId,
  pub fields:   HoldFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedBond {
  pub local_id: LocalId,
  pub fields:   BondFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedSentence {
  pub local_id: LocalId,
  pub fields:   SentenceFields,
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// One scrape session's worth of entities for a region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityGraph {
  #[serde(default)]
  pub people:    Vec<ScrapedPerson>,
  #[serde(default)]
  pub bookings:  Vec<ScrapedBooking>,
  #[serde(default)]
  pub arrests:   Vec<ScrapedArrest>,
  #[serde(default)]
  pub charges:   Vec<ScrapedCharge>,
  #[serde(default)]
  pub holds:     Vec<ScrapedHold>,
  #[serde(default)]
  pub bonds:     Vec<ScrapedBond>,
  #[serde(default)]
  pub sentences: Vec<ScrapedSentence>,
}

impl EntityGraph {
  pub fn is_empty(&self) -> bool { self.people.is_empty() }

  // ── Lookups ───────────────────────────────────────────────────────────

  pub fn booking(&self, local_id: &str) -> Option<&ScrapedBooking> {
    self.bookings.iter().find(|b| b.local_id == local_id)
  }

  pub fn arrest(&self, local_id: &str) -> Option<&ScrapedArrest> {
    self.arrests.iter().find(|a| a.local_id == local_id)
  }

  pub fn charge(&self, local_id: &str) -> Option<&ScrapedCharge> {
    self.charges.iter().find(|c| c.local_id == local_id)
  }

  pub fn hold(&self, local_id: &str) -> Option<&ScrapedHold> {
    self.holds.iter().find(|h| h.local_id == local_id)
  }

  pub fn bond(&self, local_id: &str) -> Option<&ScrapedBond> {
    self.bonds.iter().find(|b| b.local_id == local_id)
  }

  pub fn sentence(&self, local_id: &str) -> Option<&ScrapedSentence> {
    self.sentences.iter().find(|s| s.local_id == local_id)
  }

  // ── Builders ──────────────────────────────────────────────────────────
  //
  // Convenience for scraper adapters and tests. `add_*` appends the entity
  // and links it under the named parent if that parent exists; a missing
  // parent leaves the child orphaned, which commit rejects.

  pub fn add_person(
    &mut self,
    local_id: impl Into<LocalId>,
    fields: PersonFields,
  ) -> LocalId {
    let local_id = local_id.into();
    self.people.push(ScrapedPerson {
      local_id: local_id.clone(),
      fields,
      bookings: Vec::new(),
    });
    local_id
  }

  pub fn add_booking(
    &mut self,
    person: &str,
    local_id: impl Into<LocalId>,
    fields: BookingFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(p) = self.people.iter_mut().find(|p| p.local_id == person) {
      p.bookings.push(local_id.clone());
    }
    self.bookings.push(ScrapedBooking {
      local_id: local_id.clone(),
      fields,
      arrest: None,
      charges: Vec::new(),
      holds: Vec::new(),
    });
    local_id
  }

  pub fn add_arrest(
    &mut self,
    booking: &str,
    local_id: impl Into<LocalId>,
    fields: ArrestFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(b) = self.bookings.iter_mut().find(|b| b.local_id == booking) {
      b.arrest = Some(local_id.clone());
    }
    self.arrests.push(ScrapedArrest { local_id: local_id.clone(), fields });
    local_id
  }

  pub fn add_charge(
    &mut self,
    booking: &str,
    local_id: impl Into<LocalId>,
    fields: ChargeFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(b) = self.bookings.iter_mut().find(|b| b.local_id == booking) {
      b.charges.push(local_id.clone());
    }
    self.charges.push(ScrapedCharge {
      local_id: local_id.clone(),
      fields,
      bond: None,
      sentence: None,
    });
    local_id
  }

  pub fn add_hold(
    &mut self,
    booking: &str,
    local_id: impl Into<LocalId>,
    fields: HoldFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(b) = self.bookings.iter_mut().find(|b| b.local_id == booking) {
      b.holds.push(local_id.clone());
    }
    self.holds.push(ScrapedHold { local_id: local_id.clone(), fields });
    local_id
  }

  pub fn add_bond(
    &mut self,
    charge: &str,
    local_id: impl Into<LocalId>,
    fields: BondFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(c) = self.charges.iter_mut().find(|c| c.local_id == charge) {
      c.bond = Some(local_id.clone());
    }
    self.bonds.push(ScrapedBond { local_id: local_id.clone(), fields });
    local_id
  }

  pub fn add_sentence(
    &mut self,
    charge: &str,
    local_id: impl Into<LocalId>,
    fields: SentenceFields,
  ) -> LocalId {
    let local_id = local_id.into();
    if let Some(c) = self.charges.iter_mut().find(|c| c.local_id == charge) {
      c.sentence = Some(local_id.clone());
    }
    self.sentences.push(ScrapedSentence { local_id: local_id.clone(), fields });
    local_id
  }

  // ── Pruning ───────────────────────────────────────────────────────────

  /// Drop leaf entities whose sources reported no fields at all, and unlink
  /// references to them. Scraper adapters call this once per session so
  /// empty placeholder rows on roster pages do not become entities.
  pub fn prune(&mut self) {
    let blank_arrests: Vec<LocalId> = self
      .arrests
      .iter()
      .filter(|a| a.fields.is_blank())
      .map(|a| a.local_id.clone())
      .collect();
    let blank_holds: Vec<LocalId> = self
      .holds
      .iter()
      .filter(|h| h.fields.is_blank())
      .map(|h| h.local_id.clone())
      .collect();
    let blank_bonds: Vec<LocalId> = self
      .bonds
      .iter()
      .filter(|b| b.fields.is_blank())
      .map(|b| b.local_id.clone())
      .collect();
    let blank_sentences: Vec<LocalId> = self
      .sentences
      .iter()
      .filter(|s| s.fields.is_blank())
      .map(|s| s.local_id.clone())
      .collect();

    self.arrests.retain(|a| !blank_arrests.contains(&a.local_id));
    self.holds.retain(|h| !blank_holds.contains(&h.local_id));
    self.bonds.retain(|b| !blank_bonds.contains(&b.local_id));
    self
      .sentences
      .retain(|s| !blank_sentences.contains(&s.local_id));

    for booking in &mut self.bookings {
      if let Some(a) = &booking.arrest
        && blank_arrests.contains(a)
      {
        booking.arrest = None;
      }
      booking.holds.retain(|h| !blank_holds.contains(h));
    }
    for charge in &mut self.charges {
      if let Some(b) = &charge.bond
        && blank_bonds.contains(b)
      {
        charge.bond = None;
      }
      if let Some(s) = &charge.sentence
        && blank_sentences.contains(s)
      {
        charge.sentence = None;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::{ArrestFields, BondFields, PersonFields};

  #[test]
  fn builder_links_children_under_parents() {
    let mut g = EntityGraph::default();
    let p = g.add_person("p1", PersonFields::default());
    let b = g.add_booking(&p, "b1", BookingFields::default());
    let c = g.add_charge(&b, "c1", ChargeFields::default());
    g.add_bond(&c, "bo1", BondFields::default());

    assert_eq!(g.people[0].bookings, vec!["b1"]);
    assert_eq!(g.booking("b1").unwrap().charges, vec!["c1"]);
    assert_eq!(g.charge("c1").unwrap().bond.as_deref(), Some("bo1"));
  }

  #[test]
  fn add_with_unknown_parent_leaves_child_orphaned() {
    let mut g = EntityGraph::default();
    g.add_booking("nope", "b1", BookingFields::default());
    assert!(g.people.is_empty());
    assert!(g.booking("b1").is_some());
  }

  #[test]
  fn prune_drops_blank_leaves_and_unlinks_them() {
    let mut g = EntityGraph::default();
    let p = g.add_person("p1", PersonFields::default());
    let b = g.add_booking(&p, "b1", BookingFields::default());
    g.add_arrest(&b, "a1", ArrestFields::default());
    let c = g.add_charge(&b, "c1", ChargeFields::default());
    g.add_bond(
      &c,
      "bo1",
      BondFields { amount: Some("1000".into()), ..Default::default() },
    );

    g.prune();

    assert!(g.arrests.is_empty());
    assert_eq!(g.booking("b1").unwrap().arrest, None);
    // The non-blank bond survives.
    assert_eq!(g.bonds.len(), 1);
    assert_eq!(g.charge("c1").unwrap().bond.as_deref(), Some("bo1"));
  }
}
