use crate::errors::CompileResult;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// The public interface of a contract: an ABI JSON array of its
/// constructor and public functions.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Contract {
    pub constructor: Option<Constructor>,
    pub functions: Vec<Function>,
}

impl Contract {
    /// Serialize the contract into a valid JSON ABI.
    pub fn json(&self) -> CompileResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Contract {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(None)?;
        if let Some(constructor) = &self.constructor {
            seq.serialize_element(constructor)?;
        }
        for function in &self.functions {
            seq.serialize_element(function)?;
        }
        seq.end()
    }
}

/// A function interface.
#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct Function {
    pub name: String,
    /// Always "function".
    #[serde(rename = "type")]
    pub typ: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
}

/// The constructor interface.
#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct Constructor {
    /// Always "constructor".
    #[serde(rename = "type")]
    pub typ: String,
    pub inputs: Vec<Param>,
}

/// A named input or output.
#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
}

#[cfg(test)]
mod tests {
    use super::{Contract, Function, Param};

    #[test]
    fn serializes_as_array() {
        let contract = Contract {
            constructor: None,
            functions: vec![Function {
                name: "register".to_string(),
                typ: "function".to_string(),
                inputs: vec![Param {
                    name: "name".to_string(),
                    typ: "bytes32".to_string(),
                }],
                outputs: vec![],
            }],
        };
        assert_eq!(
            contract.json().unwrap(),
            r#"[{"name":"register","type":"function","inputs":[{"name":"name","type":"bytes32"}],"outputs":[]}]"#
        );
    }
}
