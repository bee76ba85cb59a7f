use crate::Timestamp;

impl bincode::Encode for Timestamp {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> core::result::Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.as_micros().to_be_bytes(), encoder)?;
        Ok(())
    }
}

impl<'de, Context> bincode::BorrowDecode<'de, Context> for Timestamp {
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(Self::from_micros(u64::from_be_bytes(
            bincode::BorrowDecode::borrow_decode(decoder)?,
        )))
    }
}

impl<Context> bincode::Decode<Context> for Timestamp {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> core::result::Result<Self, bincode::error::DecodeError> {
        Ok(Self::from_micros(u64::from_be_bytes(
            bincode::Decode::decode(decoder)?,
        )))
    }
}
