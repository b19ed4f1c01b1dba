//! Field and method descriptors used for index accounting
//!
//! A container's index tables hold one entry per distinct descriptor, so two
//! descriptors are the same symbol only when every component matches. The
//! same field name declared on two different owners counts twice.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A field reference: `owner.name:type`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSymbol {
    /// Declaring type descriptor (e.g. `Lcom/example/Foo;`)
    pub owner: String,

    /// Field name
    pub name: String,

    /// Field type descriptor
    #[serde(rename = "type")]
    pub ty: String,
}

impl FieldSymbol {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ty: ty.into(),
        }
    }
}

impl fmt::Display for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.ty)
    }
}

/// A method reference: `owner.name(params)return`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSymbol {
    /// Declaring type descriptor
    pub owner: String,

    /// Method name
    pub name: String,

    /// Parameter type descriptors, in declaration order
    #[serde(default)]
    pub params: Vec<String>,

    /// Return type descriptor
    #[serde(rename = "return")]
    pub ret: String,
}

impl MethodSymbol {
    pub fn new<P, S>(
        owner: impl Into<String>,
        name: impl Into<String>,
        params: P,
        ret: impl Into<String>,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            ret: ret.into(),
        }
    }
}

impl fmt::Display for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({}){}", self.owner, self.name, self.params.concat(), self.ret)
    }
}
