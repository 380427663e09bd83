//! Decoding concrete values out of a satisfying model.

use crate::rewriter::Rewriter;
use crate::{RwResult, RewriterError};
use opal_cells::{CellId, CellType, Value};
use std::collections::BTreeMap;

impl Rewriter {
    /// Read the concrete value of a cell from the gateway's current model.
    /// Requires a preceding `sat()` that answered `Sat`.
    pub fn decode(&self, c: CellId) -> RwResult<Value> {
        match self.arena.ty(c).clone() {
            CellType::Bool => Ok(Value::Bool(self.smt.interp_bool(&self.arena, c)?)),
            CellType::Int => Ok(Value::Int(self.smt.interp_int(&self.arena, c)?)),
            CellType::Str => {
                let id = self.smt.interp_int(&self.arena, c)?;
                match self.strs.resolve(id) {
                    Some(s) => Ok(Value::Str(s.to_string())),
                    None => Ok(Value::Str(format!("str#{}", id))),
                }
            }
            CellType::Constant(sort) => {
                let id = self.smt.interp_int(&self.arena, c)?;
                Ok(Value::Str(format!("{}#{}", sort, id)))
            }
            CellType::FinSet(_) => {
                let mut members = Vec::new();
                for &e in self.arena.has(c) {
                    if self.smt.interp_mem(&self.arena, e, c)? {
                        members.push(self.decode(e)?);
                    }
                }
                members.dedup();
                Ok(Value::Set(members))
            }
            CellType::Fun(_, _) => {
                let rel = self.arena.cdm(c).ok_or(RewriterError::MalformedCell {
                    cell: c,
                    detail: "function without a relation edge".into(),
                })?;
                let mut pairs = Vec::new();
                for &p in self.arena.has(rel) {
                    if !self.smt.interp_mem(&self.arena, p, rel)? {
                        continue;
                    }
                    let edges = self.arena.has(p);
                    if edges.len() != 2 {
                        return Err(RewriterError::MalformedCell {
                            cell: p,
                            detail: "function graph entry is not a pair".into(),
                        });
                    }
                    pairs.push((self.decode(edges[0])?, self.decode(edges[1])?));
                }
                Ok(Value::Fun(pairs))
            }
            CellType::Record(fields) => {
                let dom = self.arena.dom(c).ok_or(RewriterError::MalformedCell {
                    cell: c,
                    detail: "record without a domain edge".into(),
                })?;
                let mut out = BTreeMap::new();
                for (idx, name) in fields.keys().enumerate() {
                    let key_cell = self.arena.has(dom)[idx];
                    if self.smt.interp_mem(&self.arena, key_cell, dom)? {
                        let value_cell = self.arena.has(c)[idx];
                        out.insert(name.clone(), self.decode(value_cell)?);
                    }
                }
                Ok(Value::Record(out))
            }
            CellType::Tuple(_) => {
                let mut out = Vec::new();
                for &e in self.arena.has(c) {
                    out.push(self.decode(e)?);
                }
                Ok(Value::Tuple(out))
            }
            CellType::Seq(_) => {
                let edges = self.arena.has(c).to_vec();
                if edges.len() < 2 {
                    return Err(RewriterError::MalformedCell {
                        cell: c,
                        detail: "sequence without start/end markers".into(),
                    });
                }
                let start = self.smt.interp_int(&self.arena, edges[0])?;
                let end = self.smt.interp_int(&self.arena, edges[1])?;
                let stored = &edges[2..];
                let mut out = Vec::new();
                for i in start.max(0)..end {
                    let idx = i as usize;
                    if idx < stored.len() {
                        out.push(self.decode(stored[idx])?);
                    }
                }
                Ok(Value::Seq(out))
            }
            CellType::Unknown | CellType::FinFunSet(_, _) => {
                Err(RewriterError::MalformedCell {
                    cell: c,
                    detail: format!("type {} has no concrete decoding", self.arena.ty(c)),
                })
            }
        }
    }
}
