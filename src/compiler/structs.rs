//! `struct_collector` stage: member offsets and flattened sizes

use super::pass_manager::{PassManagerContext, Stage};
use crate::error::{Error, Result};
use crate::parser::{Location, StructDef, TypeExpr};
use std::collections::{BTreeMap, HashMap};

/// Member of a laid-out struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLayout {
    /// Member name
    pub name: String,
    /// Member type
    pub ty: TypeExpr,
    /// Offset from the start of the struct, in field elements
    pub offset: usize,
    /// Size in field elements
    pub size: usize,
}

/// Flattened struct layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    /// Struct name
    pub name: String,
    /// Members in declaration order
    pub members: Vec<MemberLayout>,
    /// Total size in field elements
    pub size: usize,
}

/// Layouts of every struct in the program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructLayouts {
    layouts: BTreeMap<String, StructLayout>,
}

impl StructLayouts {
    /// Layout of struct `name`
    pub fn get(&self, name: &str) -> Option<&StructLayout> {
        self.layouts.get(name)
    }

    /// Number of laid-out structs
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Returns true when no struct was laid out
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Size of `ty` in field elements; pointers take one slot
    pub fn size_of(&self, ty: &TypeExpr) -> Option<usize> {
        match ty {
            TypeExpr::Felt | TypeExpr::Pointer(_) => Some(1),
            TypeExpr::Struct(name) => self.get(name).map(|layout| layout.size),
            TypeExpr::Tuple(members) => members.iter().map(|m| self.size_of(m)).sum(),
        }
    }
}

/// Lays out every struct; unknown member types and recursive structs are errors
#[derive(Debug, Clone, Copy, Default)]
pub struct StructCollector;

impl Stage for StructCollector {
    fn run(&self, context: &mut PassManagerContext) -> Result<()> {
        let defs: HashMap<&str, &StructDef> = context
            .symbols
            .structs()
            .map(|def| (def.name.as_str(), def))
            .collect();

        let mut layouts = StructLayouts::default();
        let mut visiting = Vec::new();
        for def in context.symbols.structs() {
            layout(def, &defs, &mut layouts, &mut visiting)?;
        }

        context.structs = layouts;
        Ok(())
    }
}

fn layout(
    def: &StructDef,
    defs: &HashMap<&str, &StructDef>,
    layouts: &mut StructLayouts,
    visiting: &mut Vec<String>,
) -> Result<usize> {
    if let Some(done) = layouts.get(&def.name) {
        return Ok(done.size);
    }
    if visiting.contains(&def.name) {
        return Err(Error::preprocessor(
            format!("Recursive struct '{}' has infinite size.", def.name),
            &def.location,
        ));
    }
    visiting.push(def.name.clone());

    let mut members = Vec::with_capacity(def.members.len());
    let mut offset = 0;
    for member in &def.members {
        let size = type_size(&member.ty, &member.location, defs, layouts, visiting)?;
        members.push(MemberLayout {
            name: member.name.clone(),
            ty: member.ty.clone(),
            offset,
            size,
        });
        offset += size;
    }

    visiting.pop();
    layouts.layouts.insert(
        def.name.clone(),
        StructLayout {
            name: def.name.clone(),
            members,
            size: offset,
        },
    );
    Ok(offset)
}

fn type_size(
    ty: &TypeExpr,
    location: &Location,
    defs: &HashMap<&str, &StructDef>,
    layouts: &mut StructLayouts,
    visiting: &mut Vec<String>,
) -> Result<usize> {
    match ty {
        TypeExpr::Felt | TypeExpr::Pointer(_) => Ok(1),
        TypeExpr::Struct(name) => match defs.get(name.as_str()) {
            Some(def) => layout(def, defs, layouts, visiting),
            None => Err(Error::preprocessor(
                format!("Unknown type '{}'.", name),
                location,
            )),
        },
        TypeExpr::Tuple(members) => {
            let mut total = 0;
            for member in members {
                total += type_size(member, location, defs, layouts, visiting)?;
            }
            Ok(total)
        }
    }
}
