//! Filter endpoints. Each call is request-local: nothing here touches a
//! streaming pipeline or any shared state.

use super::{status::Status, wire::Image};
use crate::{pipeline::frame_buffer, types::Frame};

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageProcessingService;

impl ImageProcessingService {
    pub fn new() -> Self {
        Self
    }

    pub fn identity(&self, request: Image) -> Result<Image, Status> {
        let frame = Frame::try_from(request)?;
        Ok(frame.into())
    }

    pub fn invert(&self, request: Image) -> Result<Image, Status> {
        let frame = Frame::try_from(request)?;
        Ok(frame_buffer::invert(&frame).into())
    }

    pub fn rgb_to_gray(&self, request: Image) -> Result<Image, Status> {
        let frame = Frame::try_from(request)?;
        log::trace!(
            "rgb_to_gray on {}x{}x{}",
            frame.width(),
            frame.height(),
            frame.channels()
        );
        Ok(frame_buffer::rgb_to_gray(&frame).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::status::Code;

    fn rgb(data: Vec<u8>) -> Image {
        Image {
            width: 2,
            height: 1,
            channels: 3,
            data,
        }
    }

    #[test]
    fn identity_echoes_bytes() {
        let image = rgb(vec![1, 2, 3, 4, 5, 6]);
        let service = ImageProcessingService::new();
        assert_eq!(service.identity(image.clone()), Ok(image));
    }

    #[test]
    fn invert_negates_samples() {
        let reply = ImageProcessingService::new()
            .invert(rgb(vec![0, 10, 255, 100, 200, 50]))
            .unwrap();
        assert_eq!(reply.data, vec![255, 245, 0, 155, 55, 205]);
        assert_eq!(reply.channels, 3);
    }

    #[test]
    fn gray_has_one_channel() {
        let reply = ImageProcessingService::new()
            .rgb_to_gray(rgb(vec![255, 255, 255, 0, 0, 0]))
            .unwrap();
        assert_eq!(reply.channels, 1);
        assert_eq!(reply.data, vec![255, 0]);
    }

    #[test]
    fn rejects_short_buffers() {
        let err = ImageProcessingService::new()
            .invert(rgb(vec![0; 5]))
            .unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument);
    }
}
