use strum::EnumString;

/// Magic global objects whose fields map directly to VM instructions.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Object {
    Block,
    Msg,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BlockField {
    Number,
    Timestamp,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MsgField {
    Sender,
    Value,
}

/// Global functions that are always in scope.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum GlobalFunction {
    Require,
    Revert,
    Selfdestruct,
}

#[cfg(test)]
mod tests {
    use super::{GlobalFunction, MsgField, Object};
    use std::str::FromStr;

    #[test]
    fn builtin_parsing() {
        assert_eq!(Object::from_str("msg"), Ok(Object::Msg));
        assert_eq!(MsgField::from_str("sender"), Ok(MsgField::Sender));
        assert_eq!(
            GlobalFunction::from_str("selfdestruct"),
            Ok(GlobalFunction::Selfdestruct)
        );
        assert!(Object::from_str("tx").is_err());
    }
}
