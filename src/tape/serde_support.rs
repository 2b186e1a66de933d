use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Instruction, Tape};

impl Serialize for Tape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Tape", 4)?;
        s.serialize_field("instructions", &self.instructions)?;
        s.serialize_field("input_sizes", &self.input_sizes)?;
        s.serialize_field("output_slots", &self.output_slots)?;
        s.serialize_field("n_free", &self.n_free)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Tape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct TapeData {
            instructions: Vec<Instruction>,
            input_sizes: Vec<usize>,
            output_slots: Vec<Vec<u32>>,
            #[serde(default)]
            n_free: usize,
        }

        let data = TapeData::deserialize(deserializer)?;
        // Input slots and worksize are rebuilt by validation.
        Tape::new(
            data.instructions,
            data.input_sizes,
            data.output_slots,
            data.n_free,
        )
        .map_err(serde::de::Error::custom)
    }
}
