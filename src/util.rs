use core::any::type_name;

use zerocopy::FromBytes;

use crate::ReadError;

pub fn read<T: FromBytes + Copy>(resource: &[u8]) -> Result<T, ReadError> {
    T::read_from_prefix(resource)
        .map_err(|_| ReadError(type_name::<T>().to_string()))
        .map(|(value, _)| value)
}

pub fn read_at<T: FromBytes + Copy>(resource: &[u8], offset: u64) -> Result<T, ReadError> {
    resource
        .get(offset as usize..)
        .ok_or_else(|| ReadError(type_name::<T>().to_string()))
        .and_then(|resource| read(resource))
}
