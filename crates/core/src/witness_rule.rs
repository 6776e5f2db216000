//! Witness rules: composable boolean conditions attached to a `Signer` that
//! gate whether its witness applies in a given execution context.

use crate::error::{CoreError, CoreResult};
use crate::uint::UInt160;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

pub const MAX_SUBITEMS: usize = 16;
pub const MAX_NESTING_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum WitnessRuleAction {
    Deny = 0x00,
    Allow = 0x01,
}

impl WitnessRuleAction {
    fn from_byte(value: u8) -> CoreResult<Self> {
        match value {
            0x00 => Ok(Self::Deny),
            0x01 => Ok(Self::Allow),
            other => Err(CoreError::InvalidWitnessRuleAction(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WitnessConditionType {
    Boolean = 0x00,
    Not = 0x01,
    And = 0x02,
    Or = 0x03,
    ScriptHash = 0x18,
    Group = 0x19,
    CalledByEntry = 0x20,
    CalledByContract = 0x28,
    CalledByGroup = 0x29,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WitnessCondition {
    Boolean(bool),
    Not(Box<WitnessCondition>),
    And(Vec<WitnessCondition>),
    Or(Vec<WitnessCondition>),
    ScriptHash(UInt160),
    Group(Vec<u8>),
    CalledByEntry,
    CalledByContract(UInt160),
    CalledByGroup(Vec<u8>),
}

impl WitnessCondition {
    pub fn condition_type(&self) -> WitnessConditionType {
        match self {
            Self::Boolean(_) => WitnessConditionType::Boolean,
            Self::Not(_) => WitnessConditionType::Not,
            Self::And(_) => WitnessConditionType::And,
            Self::Or(_) => WitnessConditionType::Or,
            Self::ScriptHash(_) => WitnessConditionType::ScriptHash,
            Self::Group(_) => WitnessConditionType::Group,
            Self::CalledByEntry => WitnessConditionType::CalledByEntry,
            Self::CalledByContract(_) => WitnessConditionType::CalledByContract,
            Self::CalledByGroup(_) => WitnessConditionType::CalledByGroup,
        }
    }

    /// Structural validation: `And`/`Or` must be non-empty and within
    /// `MAX_SUBITEMS`, and nesting may not exceed `MAX_NESTING_DEPTH`.
    pub fn is_valid(&self, remaining_depth: usize) -> CoreResult<()> {
        if remaining_depth == 0 {
            return Err(CoreError::WitnessConditionTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        match self {
            Self::Not(inner) => inner.is_valid(remaining_depth - 1),
            Self::And(conditions) | Self::Or(conditions) => {
                if conditions.is_empty() || conditions.len() > MAX_SUBITEMS {
                    return Err(CoreError::TooManySubitems {
                        actual: conditions.len(),
                        max: MAX_SUBITEMS,
                    });
                }
                conditions
                    .iter()
                    .try_for_each(|c| c.is_valid(remaining_depth - 1))
            }
            _ => Ok(()),
        }
    }

    fn write(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.condition_type() as u8)?;
        match self {
            Self::Boolean(value) => writer.write_bool(*value),
            Self::Not(inner) => inner.write(writer),
            Self::And(conditions) | Self::Or(conditions) => {
                writer.write_var_int(conditions.len() as u64)?;
                conditions.iter().try_for_each(|c| c.write(writer))
            }
            Self::ScriptHash(hash) | Self::CalledByContract(hash) => {
                writer.write_bytes(hash.as_bytes())
            }
            Self::Group(group) | Self::CalledByGroup(group) => writer.write_var_bytes(group),
            Self::CalledByEntry => Ok(()),
        }
    }

    fn read(reader: &mut MemoryReader, remaining_depth: usize) -> CoreResult<Self> {
        if remaining_depth == 0 {
            return Err(CoreError::WitnessConditionTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let type_byte = reader.read_u8()?;
        Ok(match type_byte {
            0x00 => Self::Boolean(reader.read_bool()?),
            0x01 => Self::Not(Box::new(Self::read(reader, remaining_depth - 1)?)),
            0x02 | 0x03 => {
                let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
                if count == 0 {
                    return Err(CoreError::TooManySubitems {
                        actual: 0,
                        max: MAX_SUBITEMS,
                    });
                }
                let mut conditions = Vec::with_capacity(count);
                for _ in 0..count {
                    conditions.push(Self::read(reader, remaining_depth - 1)?);
                }
                if type_byte == 0x02 {
                    Self::And(conditions)
                } else {
                    Self::Or(conditions)
                }
            }
            0x18 => Self::ScriptHash(UInt160::deserialize(reader)?),
            0x19 => Self::Group(reader.read_var_bytes(33)?),
            0x20 => Self::CalledByEntry,
            0x28 => Self::CalledByContract(UInt160::deserialize(reader)?),
            0x29 => Self::CalledByGroup(reader.read_var_bytes(33)?),
            other => return Err(CoreError::InvalidWitnessConditionType(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WitnessRule {
    pub action: WitnessRuleAction,
    pub condition: WitnessCondition,
}

impl WitnessRule {
    pub fn new(action: WitnessRuleAction, condition: WitnessCondition) -> Self {
        Self { action, condition }
    }

    pub fn is_valid(&self) -> CoreResult<()> {
        self.condition.is_valid(MAX_NESTING_DEPTH)
    }
}

impl Serializable for WitnessRule {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.action as u8)?;
        self.condition.write(writer)
    }

    fn deserialize(reader: &mut MemoryReader) -> IoResult<Self> {
        let action_byte = reader.read_u8()?;
        let action = WitnessRuleAction::from_byte(action_byte)
            .map_err(|_| neo_io::IoError::format(reader.position(), "invalid witness rule action"))?;
        let condition = WitnessCondition::read(reader, MAX_NESTING_DEPTH)
            .map_err(|e| neo_io::IoError::format(reader.position(), e.to_string()))?;
        Ok(Self { action, condition })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_is_invalid() {
        let cond = WitnessCondition::And(vec![]);
        assert!(cond.is_valid(MAX_NESTING_DEPTH).is_err());
    }

    #[test]
    fn nesting_beyond_max_depth_is_invalid() {
        let mut cond = WitnessCondition::Boolean(true);
        for _ in 0..MAX_NESTING_DEPTH + 1 {
            cond = WitnessCondition::Not(Box::new(cond));
        }
        assert!(cond.is_valid(MAX_NESTING_DEPTH).is_err());
    }

    #[test]
    fn round_trips_nested_condition() {
        let rule = WitnessRule::new(
            WitnessRuleAction::Allow,
            WitnessCondition::And(vec![
                WitnessCondition::CalledByEntry,
                WitnessCondition::Boolean(false),
            ]),
        );
        let mut writer = BinaryWriter::new();
        rule.serialize(&mut writer).unwrap();
        let bytes = writer.to_bytes();
        let mut reader = MemoryReader::new(&bytes);
        let decoded = WitnessRule::deserialize(&mut reader).unwrap();
        assert_eq!(rule, decoded);
    }
}
